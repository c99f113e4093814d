// ==========================================
// 学校教务核心 - 应用层
// ==========================================
// 职责: 组装共享连接、仓储与 API，供表现层持有
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
