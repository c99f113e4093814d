// ==========================================
// 学校教务核心 - 教师档案仓储
// ==========================================
// 关系: teacher.user_id → users.id (1:1)
// ==========================================

use crate::domain::teacher::{Teacher, TeacherProfileDraft};
use crate::domain::types::TeacherStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, get_date, get_datetime, get_enum, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, employee_id, department, qualification, specialization,
           hire_date, status, salary, experience_years, created_at, updated_at
    FROM teacher
"#;

// ==========================================
// TeacherRepository - 教师仓储
// ==========================================
pub struct TeacherRepository {
    conn: SharedConnection,
}

impl TeacherRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn insert_tx(
        conn: &Connection,
        user_id: i64,
        employee_id: &str,
        draft: &TeacherProfileDraft,
    ) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO teacher (
                user_id, employee_id, department, qualification, specialization,
                hire_date, status, salary, experience_years, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)"#,
            params![
                user_id,
                employee_id.trim(),
                draft.department,
                draft.qualification,
                draft.specialization,
                fmt_date(draft.hire_date),
                draft.status.to_db_str(),
                draft.salary,
                draft.experience_years,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新档案（工号为空时保持不变）
    pub fn update_tx(conn: &Connection, id: i64, draft: &TeacherProfileDraft) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE teacher
               SET employee_id = COALESCE(?1, employee_id), department = ?2,
                   qualification = ?3, specialization = ?4, hire_date = ?5, status = ?6,
                   salary = ?7, experience_years = ?8, updated_at = ?9
               WHERE id = ?10"#,
            params![
                draft.employee_id.as_ref().map(|s| s.trim().to_string()),
                draft.department,
                draft.qualification,
                draft.specialization,
                fmt_date(draft.hire_date),
                draft.status.to_db_str(),
                draft.salary,
                draft.experience_years,
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Teacher", id));
        }
        Ok(())
    }

    pub fn set_status_tx(conn: &Connection, id: i64, status: TeacherStatus) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE teacher SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_db_str(), now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Teacher", id));
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Teacher>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    pub fn find_by_user_id_tx(conn: &Connection, user_id: i64) -> RepositoryResult<Option<Teacher>> {
        let sql = format!("{} WHERE user_id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![user_id], map_row).optional()?)
    }

    /// 统计以指定前缀开头的工号数量（用于生成序号）
    pub fn count_with_prefix_tx(conn: &Connection, prefix: &str) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM teacher WHERE employee_id LIKE ?1 || '%'",
            params![prefix],
            |row| row.get(0),
        )?)
    }

    pub fn exists_employee_id_tx(conn: &Connection, employee_id: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM teacher WHERE employee_id = ?1",
                params![employee_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_active_tx(conn: &Connection) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM teacher WHERE status = 'ACTIVE'",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Teacher>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_by_user_id(&self, user_id: i64) -> RepositoryResult<Option<Teacher>> {
        let conn = lock(&self.conn)?;
        Self::find_by_user_id_tx(&conn, user_id)
    }

    pub fn list_by_status(&self, status: Option<TeacherStatus>) -> RepositoryResult<Vec<Teacher>> {
        let conn = lock(&self.conn)?;
        Self::list_by_status_tx(&conn, status)
    }

    pub fn list_by_status_tx(conn: &Connection, status: Option<TeacherStatus>) -> RepositoryResult<Vec<Teacher>> {
        let sql = format!("{} WHERE (?1 IS NULL OR status = ?1) ORDER BY employee_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let teachers = stmt
            .query_map(params![status.map(|s| s.to_db_str())], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(teachers)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get(0)?,
        user_id: row.get(1)?,
        employee_id: row.get(2)?,
        department: row.get(3)?,
        qualification: row.get(4)?,
        specialization: row.get(5)?,
        hire_date: get_date(row, 6)?,
        status: get_enum(row, 7, TeacherStatus::from_str)?,
        salary: row.get(8)?,
        experience_years: row.get(9)?,
        created_at: get_datetime(row, 10)?,
        updated_at: get_datetime(row, 11)?,
    })
}
