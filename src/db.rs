// ==========================================
// 学校教务核心 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/busy_timeout）
// - 幂等建表，记录 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期存储格式
pub const DATE_FMT: &str = "%Y-%m-%d";

/// 时间戳存储格式
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试/演示用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
///
/// 说明：
/// - academic_year 的“当前学年”单例由部分唯一索引兜底
/// - assignment 一张表承载四种多对多关系
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    if let Some(version) = read_schema_version(conn)? {
        if version > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "数据库 schema_version={} 高于代码期望版本 {}",
                version,
                CURRENT_SCHEMA_VERSION
            );
        }
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    address TEXT,
    date_of_birth TEXT,
    gender TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_role (
    user_id INTEGER NOT NULL REFERENCES users(id),
    role TEXT NOT NULL CHECK (role IN ('SUPER_ADMIN', 'ADMIN', 'TEACHER', 'STUDENT')),
    PRIMARY KEY (user_id, role)
);

CREATE TABLE IF NOT EXISTS academic_year (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    is_current INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (end_date > start_date)
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_academic_year_single_current
    ON academic_year(is_current) WHERE is_current = 1;

CREATE TABLE IF NOT EXISTS teacher (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
    employee_id TEXT NOT NULL UNIQUE,
    department TEXT,
    qualification TEXT,
    specialization TEXT,
    hire_date TEXT NOT NULL,
    status TEXT NOT NULL,
    salary REAL NOT NULL DEFAULT 0 CHECK (salary >= 0),
    experience_years INTEGER NOT NULL DEFAULT 0 CHECK (experience_years >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS school_class (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    grade_level INTEGER NOT NULL CHECK (grade_level BETWEEN 1 AND 12),
    section TEXT NOT NULL,
    capacity INTEGER NOT NULL CHECK (capacity > 0),
    room_number TEXT,
    academic_year_id INTEGER NOT NULL REFERENCES academic_year(id),
    class_teacher_id INTEGER REFERENCES teacher(id),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (grade_level, section, academic_year_id)
);

CREATE TABLE IF NOT EXISTS subject (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    description TEXT,
    credit_hours REAL NOT NULL DEFAULT 0,
    department TEXT,
    is_core INTEGER NOT NULL DEFAULT 0,
    grade_levels TEXT NOT NULL DEFAULT '[]',
    primary_teacher_id INTEGER REFERENCES teacher(id),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
    student_id TEXT NOT NULL UNIQUE,
    admission_date TEXT NOT NULL,
    academic_year_id INTEGER NOT NULL REFERENCES academic_year(id),
    guardian_name TEXT,
    guardian_phone TEXT,
    status TEXT NOT NULL,
    total_fees REAL NOT NULL DEFAULT 0 CHECK (total_fees >= 0),
    fees_paid REAL NOT NULL DEFAULT 0 CHECK (fees_paid >= 0),
    fees_pending REAL NOT NULL DEFAULT 0 CHECK (fees_pending >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    relation_kind TEXT NOT NULL
        CHECK (relation_kind IN ('TEACHER_SUBJECT', 'TEACHER_CLASS', 'STUDENT_SUBJECT', 'STUDENT_CLASS')),
    owner_id INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    academic_year_id INTEGER NOT NULL REFERENCES academic_year(id),
    assigned_date TEXT NOT NULL,
    status TEXT NOT NULL
        CHECK (status IN ('ASSIGNED', 'UNASSIGNED', 'ENROLLED', 'DROPPED', 'COMPLETED')),
    is_primary_teacher INTEGER NOT NULL DEFAULT 0,
    is_class_teacher INTEGER NOT NULL DEFAULT 0,
    grade TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (relation_kind, owner_id, target_id, academic_year_id)
);

CREATE INDEX IF NOT EXISTS idx_assignment_target
    ON assignment(relation_kind, target_id, academic_year_id, status);
CREATE INDEX IF NOT EXISTS idx_assignment_owner
    ON assignment(relation_kind, owner_id, academic_year_id, status);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor INTEGER NOT NULL,
    target_kind TEXT NOT NULL,
    target_id INTEGER NOT NULL,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts DESC);
CREATE INDEX IF NOT EXISTS idx_action_log_target ON action_log(target_kind, target_id);
"#;
