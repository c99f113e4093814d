// ==========================================
// 学校教务核心 - API 层
// ==========================================
// 职责: 角色校验 + 事务编排 + 操作留痕，供外部表现层调用
// 红线: 每个管理写操作一个事务，审计日志在同一事务内写入
// ==========================================

pub mod academic_year_api;
pub mod class_api;
pub mod enrollment_api;
pub mod error;
pub mod reporting_api;
pub mod student_api;
pub mod subject_api;
pub mod teacher_api;
pub mod user_api;
pub mod validator;

// 重导出核心类型
pub use academic_year_api::AcademicYearApi;
pub use class_api::{ClassApi, ClassRoster};
pub use enrollment_api::{AssignOutcome, EnrollmentApi};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use reporting_api::{
    ClassUtilization, FeeCollectionReport, GradeSummary, OverviewReport, ReportingApi, TeacherWorkload,
};
pub use student_api::{NewStudent, StudentApi};
pub use subject_api::SubjectApi;
pub use teacher_api::{NewTeacher, TeacherApi};
pub use user_api::UserApi;
pub use validator::AccessValidator;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::identity::Actor;
use crate::domain::types::EntityKind;
use crate::repository::action_log_repo::ActionLogRepository;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

/// 在调用方事务内写入操作日志
pub(crate) fn record_action(
    conn: &Connection,
    actor: &Actor,
    action_type: ActionType,
    target_kind: EntityKind,
    target_id: i64,
    payload: JsonValue,
) -> ApiResult<()> {
    let log = ActionLog::new(action_type, actor.user_id, target_kind, target_id, Some(payload));
    ActionLogRepository::insert_tx(conn, &log)?;
    Ok(())
}
