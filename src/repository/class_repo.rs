// ==========================================
// 学校教务核心 - 班级数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::school_class::{SchoolClass, SchoolClassDraft};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{get_datetime, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, grade_level, section, capacity, room_number,
           academic_year_id, class_teacher_id, is_active, created_at, updated_at
    FROM school_class
"#;

// ==========================================
// SchoolClassRepository - 班级仓储
// ==========================================
pub struct SchoolClassRepository {
    conn: SharedConnection,
}

impl SchoolClassRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 插入班级（capacity 由调用方解析默认值后传入）
    pub fn insert_tx(conn: &Connection, draft: &SchoolClassDraft, capacity: i32) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO school_class (
                name, grade_level, section, capacity, room_number,
                academic_year_id, class_teacher_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)"#,
            params![
                draft.name.trim(),
                draft.grade_level,
                draft.section.trim().to_uppercase(),
                capacity,
                draft.room_number,
                draft.academic_year_id,
                draft.class_teacher_id,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_tx(conn: &Connection, id: i64, draft: &SchoolClassDraft, capacity: i32) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE school_class
               SET name = ?1, grade_level = ?2, section = ?3, capacity = ?4,
                   room_number = ?5, academic_year_id = ?6, updated_at = ?7
               WHERE id = ?8"#,
            params![
                draft.name.trim(),
                draft.grade_level,
                draft.section.trim().to_uppercase(),
                capacity,
                draft.room_number,
                draft.academic_year_id,
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SchoolClass", id));
        }
        Ok(())
    }

    pub fn set_class_teacher_tx(conn: &Connection, id: i64, teacher_id: Option<i64>) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE school_class SET class_teacher_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![teacher_id, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SchoolClass", id));
        }
        Ok(())
    }

    pub fn set_active_tx(conn: &Connection, id: i64, is_active: bool) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE school_class SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SchoolClass", id));
        }
        Ok(())
    }

    pub fn clear_class_teacher_for_tx(conn: &Connection, teacher_id: i64) -> RepositoryResult<usize> {
        Ok(conn.execute(
            "UPDATE school_class SET class_teacher_id = NULL, updated_at = ?1 WHERE class_teacher_id = ?2",
            params![now_ts(), teacher_id],
        )?)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<SchoolClass>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    /// 按 (年级, 分班, 学年) 查询
    pub fn find_by_slot_tx(
        conn: &Connection,
        grade_level: i32,
        section: &str,
        academic_year_id: i64,
    ) -> RepositoryResult<Option<SchoolClass>> {
        let sql = format!(
            "{} WHERE grade_level = ?1 AND section = ?2 AND academic_year_id = ?3",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(
                &sql,
                params![grade_level, section.trim().to_uppercase(), academic_year_id],
                map_row,
            )
            .optional()?)
    }

    pub fn count_active_tx(conn: &Connection, academic_year_id: Option<i64>) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM school_class WHERE is_active = 1 AND (?1 IS NULL OR academic_year_id = ?1)",
            params![academic_year_id],
            |row| row.get(0),
        )?)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SchoolClass>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询学年下的班级（按年级、分班排序）
    pub fn list_by_year(&self, academic_year_id: i64, include_inactive: bool) -> RepositoryResult<Vec<SchoolClass>> {
        let conn = lock(&self.conn)?;
        Self::list_by_year_tx(&conn, academic_year_id, include_inactive)
    }

    pub fn list_by_year_tx(
        conn: &Connection,
        academic_year_id: i64,
        include_inactive: bool,
    ) -> RepositoryResult<Vec<SchoolClass>> {
        let sql = format!(
            "{} WHERE academic_year_id = ?1 AND (?2 OR is_active = 1) ORDER BY grade_level, section",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let classes = stmt
            .query_map(params![academic_year_id, include_inactive], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<SchoolClass> {
    Ok(SchoolClass {
        id: row.get(0)?,
        name: row.get(1)?,
        grade_level: row.get(2)?,
        section: row.get(3)?,
        capacity: row.get(4)?,
        room_number: row.get(5)?,
        academic_year_id: row.get(6)?,
        class_teacher_id: row.get(7)?,
        is_active: row.get(8)?,
        created_at: get_datetime(row, 9)?,
        updated_at: get_datetime(row, 10)?,
    })
}
