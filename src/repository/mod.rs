// ==========================================
// 学校教务核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// 约定: *_tx 关联函数在调用方事务内执行；实例方法自行加锁
// ==========================================

pub mod academic_year_repo;
pub mod action_log_repo;
pub mod assignment_repo;
pub mod class_repo;
pub mod error;
pub(crate) mod row_codec;
pub mod student_repo;
pub mod subject_repo;
pub mod teacher_repo;
pub mod transaction;
pub mod user_repo;

// 重导出核心仓储
pub use academic_year_repo::AcademicYearRepository;
pub use action_log_repo::ActionLogRepository;
pub use assignment_repo::AssignmentRepository;
pub use class_repo::SchoolClassRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use student_repo::{FeeTotals, StudentRepository};
pub use subject_repo::SubjectRepository;
pub use teacher_repo::TeacherRepository;
pub use transaction::{lock, share, with_transaction, write_transaction, SharedConnection};
pub use user_repo::UserRepository;
