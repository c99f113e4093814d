// ==========================================
// 学校教务核心 - 操作日志数据仓储
// ==========================================
// 红线: 管理写操作与日志在同一事务内落库
// 红线: 日志只追加，不更新、不删除
// ==========================================

mod core;
mod queries;


pub use self::core::ActionLogRepository;
