// ==========================================
// 学校教务核心 - 学科数据仓储
// ==========================================
// 存储: grade_levels 以 JSON 数组存储
// ==========================================

use crate::domain::subject::{Subject, SubjectDraft};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{get_datetime, get_grade_levels, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, code, description, credit_hours, department, is_core,
           grade_levels, primary_teacher_id, is_active, created_at, updated_at
    FROM subject
"#;

// ==========================================
// SubjectRepository - 学科仓储
// ==========================================
pub struct SubjectRepository {
    conn: SharedConnection,
}

impl SubjectRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn grade_levels_json(draft: &SubjectDraft) -> RepositoryResult<String> {
        serde_json::to_string(&draft.grade_levels).map_err(|e| RepositoryError::FieldValueError {
            field: "grade_levels".to_string(),
            message: e.to_string(),
        })
    }

    pub fn insert_tx(conn: &Connection, draft: &SubjectDraft) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO subject (
                name, code, description, credit_hours, department, is_core,
                grade_levels, primary_teacher_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, 1, ?8, ?8)"#,
            params![
                draft.name.trim(),
                draft.normalized_code(),
                draft.description,
                draft.credit_hours,
                draft.department,
                draft.is_core,
                Self::grade_levels_json(draft)?,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_tx(conn: &Connection, id: i64, draft: &SubjectDraft) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE subject
               SET name = ?1, code = ?2, description = ?3, credit_hours = ?4,
                   department = ?5, is_core = ?6, grade_levels = ?7, updated_at = ?8
               WHERE id = ?9"#,
            params![
                draft.name.trim(),
                draft.normalized_code(),
                draft.description,
                draft.credit_hours,
                draft.department,
                draft.is_core,
                Self::grade_levels_json(draft)?,
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Subject", id));
        }
        Ok(())
    }

    pub fn set_primary_teacher_tx(conn: &Connection, id: i64, teacher_id: Option<i64>) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE subject SET primary_teacher_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![teacher_id, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Subject", id));
        }
        Ok(())
    }

    pub fn set_active_tx(conn: &Connection, id: i64, is_active: bool) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE subject SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Subject", id));
        }
        Ok(())
    }

    /// 清除指向该教师的主讲标记（教师停用时级联）
    pub fn clear_primary_teacher_for_tx(conn: &Connection, teacher_id: i64) -> RepositoryResult<usize> {
        Ok(conn.execute(
            "UPDATE subject SET primary_teacher_id = NULL, updated_at = ?1 WHERE primary_teacher_id = ?2",
            params![now_ts(), teacher_id],
        )?)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Subject>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    pub fn find_by_code_tx(conn: &Connection, code: &str) -> RepositoryResult<Option<Subject>> {
        let sql = format!("{} WHERE code = ?1", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![code.trim().to_uppercase()], map_row)
            .optional()?)
    }

    pub fn count_active_tx(conn: &Connection) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM subject WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Subject>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Subject>> {
        let conn = lock(&self.conn)?;
        Self::find_by_code_tx(&conn, code)
    }

    pub fn list(&self, include_inactive: bool) -> RepositoryResult<Vec<Subject>> {
        let conn = lock(&self.conn)?;
        let sql = format!("{} WHERE (?1 OR is_active = 1) ORDER BY code", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let subjects = stmt
            .query_map(params![include_inactive], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        credit_hours: row.get(4)?,
        department: row.get(5)?,
        is_core: row.get(6)?,
        grade_levels: get_grade_levels(row, 7)?,
        primary_teacher_id: row.get(8)?,
        is_active: row.get(9)?,
        created_at: get_datetime(row, 10)?,
        updated_at: get_datetime(row, 11)?,
    })
}
