// ==========================================
// 学校教务核心 - 配置层
// ==========================================
// 职责: 学校级配置读取与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, SchoolSettings};
