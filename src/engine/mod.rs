// ==========================================
// 学校教务核心 - 规则引擎层
// ==========================================
// 职责: 实现业务规则判定,不拼 SQL
// 红线: Engine 不拼 SQL, 无状态、无 I/O
// 红线: 所有拒绝必须给出可定位的 RuleViolation
// ==========================================

pub mod academic_year;
pub mod enrollment;
pub mod error;
pub mod fees;
pub mod identifier;
pub mod reporting;

// 重导出核心引擎
pub use academic_year::AcademicYearRules;
pub use enrollment::{AssignPlan, EnrollmentCore, SyncPlan};
pub use error::RuleViolation;
pub use fees::{FeeLedgerEngine, FeeSnapshot};
pub use identifier::IdentifierGenerator;
pub use reporting::ReportingCore;

/// 保留 1 位小数
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
