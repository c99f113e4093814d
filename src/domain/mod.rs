// ==========================================
// 学校教务核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、字段校验、纯业务口径
// 红线: 不含数据访问逻辑,不含编排逻辑
// ==========================================

pub mod academic_year;
pub mod action_log;
pub mod assignment;
pub mod identity;
pub mod school_class;
pub mod student;
pub mod subject;
pub mod teacher;
pub mod types;
pub mod validation;

// 重导出核心类型
pub use academic_year::{AcademicYear, AcademicYearDraft};
pub use action_log::{ActionLog, ActionType};
pub use assignment::{Assignment, AssignmentAttrs, AssignmentKey, SyncReport};
pub use identity::{Actor, User, UserDraft};
pub use school_class::{SchoolClass, SchoolClassDraft};
pub use student::{pending_fees, FeeLedger, Student, StudentProfileDraft};
pub use subject::{Subject, SubjectDraft};
pub use teacher::{Teacher, TeacherProfileDraft};
pub use types::{AssignmentStatus, EntityKind, RelationKind, Role, StudentStatus, TeacherStatus};
pub use validation::FieldViolation;
