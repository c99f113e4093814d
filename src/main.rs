// ==========================================
// 学校教务核心 - 命令行入口
// ==========================================
// 用法: school-core [数据库路径]
// 行为: 打开数据库、幂等建表、输出总览报表（JSON）
// ==========================================

use anyhow::Context;
use school_core::app::{get_default_db_path, AppState};
use school_core::{i18n, logging};

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", school_core::APP_NAME, school_core::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path.clone()).with_context(|| format!("无法初始化数据库: {}", db_path))?;

    let settings = state.config_manager.settings()?;
    i18n::set_locale(&settings.locale);

    let overview = state
        .reporting_api
        .overview()
        .map_err(|e| anyhow::anyhow!("生成总览失败: {}", e))?;
    let json = serde_json::to_string_pretty(&overview)?;
    tracing::info!(school = %overview.school_name, "总览:\n{}", json);
    println!("{}", json);

    Ok(())
}
