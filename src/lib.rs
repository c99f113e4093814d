// ==========================================
// 学校教务核心 - 核心库
// ==========================================
// 范围: 学年、班级、学科、师生身份与档案、分配/选课、学费台账、报表
// 技术栈: Rust + SQLite
// 约定: 身份认证与表现层由外部提供，本库只消费 Actor
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 学校级配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AssignmentStatus, EntityKind, RelationKind, Role, StudentStatus, TeacherStatus};

// 领域实体
pub use domain::{
    AcademicYear, AcademicYearDraft, ActionLog, ActionType, Actor, Assignment, AssignmentAttrs, AssignmentKey,
    SchoolClass, SchoolClassDraft, Student, StudentProfileDraft, Subject, SubjectDraft, SyncReport, Teacher,
    TeacherProfileDraft, User, UserDraft,
};

// 引擎
pub use engine::{AcademicYearRules, EnrollmentCore, FeeLedgerEngine, IdentifierGenerator, ReportingCore};

// API
pub use api::{
    AcademicYearApi, ApiError, ApiResult, ClassApi, EnrollmentApi, ErrorResponse, ReportingApi, StudentApi,
    SubjectApi, TeacherApi, UserApi,
};

// 应用状态
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "学校教务核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
