// ==========================================
// 学校教务核心 - 应用状态
// ==========================================
// 职责: 打开数据库、建表，组装共享连接上的所有 Repository 与 API 实例
// ==========================================

use rusqlite::Connection;
use std::sync::Arc;

use crate::api::{
    AcademicYearApi, ClassApi, EnrollmentApi, ReportingApi, StudentApi, SubjectApi, TeacherApi, UserApi,
};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    share, AcademicYearRepository, ActionLogRepository, AssignmentRepository, SchoolClassRepository,
    SharedConnection, StudentRepository, SubjectRepository, TeacherRepository, UserRepository,
};

/// 应用状态
///
/// 所有 Repository / API 共享同一个 `Arc<Mutex<Connection>>`
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    pub conn: SharedConnection,

    pub academic_year_api: Arc<AcademicYearApi>,
    pub class_api: Arc<ClassApi>,
    pub subject_api: Arc<SubjectApi>,
    pub enrollment_api: Arc<EnrollmentApi>,
    pub teacher_api: Arc<TeacherApi>,
    pub student_api: Arc<StudentApi>,
    pub user_api: Arc<UserApi>,
    pub reporting_api: Arc<ReportingApi>,

    /// 配置管理器（学校名称、编号前缀、默认容量、语言）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 打开数据库文件并初始化
    ///
    /// # 说明
    /// 1. 打开连接（统一 PRAGMA）
    /// 2. 幂等建表并写入 schema_version
    /// 3. 创建所有 Repository 与 API
    pub fn new(db_path: String) -> anyhow::Result<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);
        let conn = open_sqlite_connection(&db_path)?;
        Self::from_connection(db_path, conn)
    }

    /// 基于已打开的连接初始化（测试可传入内存库）
    pub fn from_connection(db_path: String, conn: Connection) -> anyhow::Result<Self> {
        init_schema(&conn)?;
        let conn = share(conn);

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let year_repo = Arc::new(AcademicYearRepository::new(conn.clone()));
        let class_repo = Arc::new(SchoolClassRepository::new(conn.clone()));
        let subject_repo = Arc::new(SubjectRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let teacher_repo = Arc::new(TeacherRepository::new(conn.clone()));
        let student_repo = Arc::new(StudentRepository::new(conn.clone()));
        let user_repo = Arc::new(UserRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::new(conn.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let academic_year_api = Arc::new(AcademicYearApi::new(conn.clone(), year_repo));
        let class_api = Arc::new(ClassApi::new(conn.clone(), class_repo));
        let subject_api = Arc::new(SubjectApi::new(conn.clone(), subject_repo));
        let enrollment_api = Arc::new(EnrollmentApi::new(conn.clone(), assignment_repo));
        let teacher_api = Arc::new(TeacherApi::new(conn.clone(), teacher_repo));
        let student_api = Arc::new(StudentApi::new(conn.clone(), student_repo));
        let user_api = Arc::new(UserApi::new(conn.clone(), user_repo));
        let reporting_api = Arc::new(ReportingApi::new(conn.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            academic_year_api,
            class_api,
            subject_api,
            enrollment_api,
            teacher_api,
            student_api,
            user_api,
            reporting_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 默认数据库路径
///
/// # 优先级
/// 1. 环境变量 SCHOOL_CORE_DB_PATH
/// 2. 用户数据目录下的 school-core/school_core.db
/// 3. 当前目录 ./school_core.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SCHOOL_CORE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./school_core.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("school-core-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("school-core");

        // 目录创建失败时回退到当前目录
        match std::fs::create_dir_all(&dir) {
            Ok(()) => path = dir.join("school_core.db"),
            Err(e) => tracing::warn!("无法创建数据目录 {}: {}", dir.display(), e),
        }
    }

    path.to_string_lossy().to_string()
}
