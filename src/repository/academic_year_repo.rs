// ==========================================
// 学校教务核心 - 学年数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 切换当前学年必须在同一事务内“先清后设”
// ==========================================

use crate::domain::academic_year::{AcademicYear, AcademicYearDraft};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, get_date, get_datetime, now_ts};
use crate::repository::transaction::{lock, write_transaction, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, start_date, end_date, is_current, is_active, created_at, updated_at
    FROM academic_year
"#;

// ==========================================
// AcademicYearRepository - 学年仓储
// ==========================================
pub struct AcademicYearRepository {
    conn: SharedConnection,
}

impl AcademicYearRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 事务内操作（由调用方持有事务）
    // ==========================================

    /// 插入学年；is_current=true 时先清除其他当前学年
    pub fn insert_tx(conn: &Connection, draft: &AcademicYearDraft) -> RepositoryResult<i64> {
        if draft.is_current {
            Self::clear_current_tx(conn)?;
        }
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO academic_year (
                name, start_date, end_date, is_current, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)"#,
            params![
                draft.name.trim(),
                fmt_date(draft.start_date),
                fmt_date(draft.end_date),
                draft.is_current,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新学年字段；is_current=true 时先清除其他当前学年
    ///
    /// 说明: is_current=false 不会把当前学年“取消当前”，切换只能通过 set_current_tx
    pub fn update_tx(conn: &Connection, id: i64, draft: &AcademicYearDraft) -> RepositoryResult<()> {
        if draft.is_current {
            Self::clear_current_tx(conn)?;
        }
        let rows = conn.execute(
            r#"UPDATE academic_year
               SET name = ?1, start_date = ?2, end_date = ?3,
                   is_current = CASE WHEN ?4 THEN 1 ELSE is_current END,
                   updated_at = ?5
               WHERE id = ?6"#,
            params![
                draft.name.trim(),
                fmt_date(draft.start_date),
                fmt_date(draft.end_date),
                draft.is_current,
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AcademicYear", id));
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<AcademicYear>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    pub fn find_by_name_tx(conn: &Connection, name: &str) -> RepositoryResult<Option<AcademicYear>> {
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![name.trim()], map_row).optional()?)
    }

    pub fn find_current_tx(conn: &Connection) -> RepositoryResult<Option<AcademicYear>> {
        let sql = format!("{} WHERE is_current = 1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, [], map_row).optional()?)
    }

    /// 清除所有当前学年标记
    pub fn clear_current_tx(conn: &Connection) -> RepositoryResult<usize> {
        Ok(conn.execute(
            "UPDATE academic_year SET is_current = 0, updated_at = ?1 WHERE is_current = 1",
            params![now_ts()],
        )?)
    }

    /// 设置当前学年（先清后设，调用方保证在事务中）
    pub fn set_current_tx(conn: &Connection, id: i64) -> RepositoryResult<()> {
        Self::clear_current_tx(conn)?;
        let rows = conn.execute(
            "UPDATE academic_year SET is_current = 1, updated_at = ?1 WHERE id = ?2",
            params![now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AcademicYear", id));
        }
        Ok(())
    }

    pub fn set_active_tx(conn: &Connection, id: i64, is_active: bool) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE academic_year SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AcademicYear", id));
        }
        Ok(())
    }

    /// 统计依赖数据 (学生数, 班级数)
    pub fn count_dependents_tx(conn: &Connection, id: i64) -> RepositoryResult<(i64, i64)> {
        let students: i64 = conn.query_row(
            "SELECT COUNT(*) FROM student WHERE academic_year_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let classes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM school_class WHERE academic_year_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok((students, classes))
    }

    pub fn count_current_tx(conn: &Connection) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM academic_year WHERE is_current = 1",
            [],
            |row| row.get(0),
        )?)
    }

    // ==========================================
    // 独立操作（自行加锁）
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<AcademicYear>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_current(&self) -> RepositoryResult<Option<AcademicYear>> {
        let conn = lock(&self.conn)?;
        Self::find_current_tx(&conn)
    }

    pub fn count_current(&self) -> RepositoryResult<i64> {
        let conn = lock(&self.conn)?;
        Self::count_current_tx(&conn)
    }

    /// 查询学年列表（按开始日期倒序）
    pub fn list(&self, include_inactive: bool) -> RepositoryResult<Vec<AcademicYear>> {
        let conn = lock(&self.conn)?;
        let sql = if include_inactive {
            format!("{} ORDER BY start_date DESC", SELECT_COLUMNS)
        } else {
            format!("{} WHERE is_active = 1 ORDER BY start_date DESC", SELECT_COLUMNS)
        };
        let mut stmt = conn.prepare(&sql)?;
        let years = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(years)
    }

    /// 设置当前学年（独立事务）
    pub fn set_current(&self, id: i64) -> RepositoryResult<()> {
        write_transaction(&self.conn, |tx| Self::set_current_tx(tx, id))
    }
}

/// 映射数据库行到 AcademicYear
fn map_row(row: &Row) -> rusqlite::Result<AcademicYear> {
    Ok(AcademicYear {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: get_date(row, 2)?,
        end_date: get_date(row, 3)?,
        is_current: row.get(4)?,
        is_active: row.get(5)?,
        created_at: get_datetime(row, 6)?,
        updated_at: get_datetime(row, 7)?,
    })
}
