// ==========================================
// 学校教务核心 - 学生档案仓储
// ==========================================
// 红线: 任何写入 total_fees / fees_paid 的语句同时重算 fees_pending
// ==========================================

use crate::domain::student::{pending_fees, Student, StudentProfileDraft};
use crate::domain::types::StudentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, get_date, get_datetime, get_enum, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, student_id, admission_date, academic_year_id,
           guardian_name, guardian_phone, status,
           total_fees, fees_paid, fees_pending, created_at, updated_at
    FROM student
"#;

/// 学费汇总 (应收合计, 实收合计, 计入收缴率的实收合计)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeeTotals {
    pub total_fees: f64,
    pub fees_paid: f64,
    pub fees_pending: f64,
    /// Σ min(paid, total)，超额部分不计入收缴率
    pub collected_capped: f64,
}

// ==========================================
// StudentRepository - 学生仓储
// ==========================================
pub struct StudentRepository {
    conn: SharedConnection,
}

impl StudentRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn insert_tx(
        conn: &Connection,
        user_id: i64,
        student_id: &str,
        draft: &StudentProfileDraft,
    ) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO student (
                user_id, student_id, admission_date, academic_year_id,
                guardian_name, guardian_phone, status,
                total_fees, fees_paid, fees_pending, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)"#,
            params![
                user_id,
                student_id.trim(),
                fmt_date(draft.admission_date),
                draft.academic_year_id,
                draft.guardian_name,
                draft.guardian_phone,
                draft.status.to_db_str(),
                draft.total_fees,
                draft.fees_paid,
                pending_fees(draft.total_fees, draft.fees_paid),
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新档案（学号为空时保持不变）
    pub fn update_tx(conn: &Connection, id: i64, draft: &StudentProfileDraft) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE student
               SET student_id = COALESCE(?1, student_id), admission_date = ?2,
                   academic_year_id = ?3, guardian_name = ?4, guardian_phone = ?5,
                   status = ?6, total_fees = ?7, fees_paid = ?8, fees_pending = ?9,
                   updated_at = ?10
               WHERE id = ?11"#,
            params![
                draft.student_id.as_ref().map(|s| s.trim().to_string()),
                fmt_date(draft.admission_date),
                draft.academic_year_id,
                draft.guardian_name,
                draft.guardian_phone,
                draft.status.to_db_str(),
                draft.total_fees,
                draft.fees_paid,
                pending_fees(draft.total_fees, draft.fees_paid),
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Student", id));
        }
        Ok(())
    }

    /// 写入学费台账（pending 在此统一重算）
    pub fn save_fees_tx(conn: &Connection, id: i64, total_fees: f64, fees_paid: f64) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE student
               SET total_fees = ?1, fees_paid = ?2, fees_pending = ?3, updated_at = ?4
               WHERE id = ?5"#,
            params![
                total_fees,
                fees_paid,
                pending_fees(total_fees, fees_paid),
                now_ts(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Student", id));
        }
        Ok(())
    }

    pub fn set_status_tx(conn: &Connection, id: i64, status: StudentStatus) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE student SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_db_str(), now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Student", id));
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Student>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    pub fn find_by_user_id_tx(conn: &Connection, user_id: i64) -> RepositoryResult<Option<Student>> {
        let sql = format!("{} WHERE user_id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![user_id], map_row).optional()?)
    }

    pub fn count_with_prefix_tx(conn: &Connection, prefix: &str) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM student WHERE student_id LIKE ?1 || '%'",
            params![prefix],
            |row| row.get(0),
        )?)
    }

    pub fn exists_student_id_tx(conn: &Connection, student_id: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM student WHERE student_id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_by_status_tx(conn: &Connection, status: StudentStatus) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM student WHERE status = ?1",
            params![status.to_db_str()],
            |row| row.get(0),
        )?)
    }

    /// 学费汇总；academic_year_id 为 None 时统计全校
    pub fn fee_totals_tx(conn: &Connection, academic_year_id: Option<i64>) -> RepositoryResult<FeeTotals> {
        Ok(conn.query_row(
            r#"SELECT COALESCE(SUM(total_fees), 0),
                      COALESCE(SUM(fees_paid), 0),
                      COALESCE(SUM(fees_pending), 0),
                      COALESCE(SUM(MIN(fees_paid, total_fees)), 0)
               FROM student
               WHERE (?1 IS NULL OR academic_year_id = ?1)"#,
            params![academic_year_id],
            |row| {
                Ok(FeeTotals {
                    total_fees: row.get(0)?,
                    fees_paid: row.get(1)?,
                    fees_pending: row.get(2)?,
                    collected_capped: row.get(3)?,
                })
            },
        )?)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Student>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_by_user_id(&self, user_id: i64) -> RepositoryResult<Option<Student>> {
        let conn = lock(&self.conn)?;
        Self::find_by_user_id_tx(&conn, user_id)
    }

    pub fn list_by_year(&self, academic_year_id: i64) -> RepositoryResult<Vec<Student>> {
        let conn = lock(&self.conn)?;
        let sql = format!("{} WHERE academic_year_id = ?1 ORDER BY student_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let students = stmt
            .query_map(params![academic_year_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        user_id: row.get(1)?,
        student_id: row.get(2)?,
        admission_date: get_date(row, 3)?,
        academic_year_id: row.get(4)?,
        guardian_name: row.get(5)?,
        guardian_phone: row.get(6)?,
        status: get_enum(row, 7, StudentStatus::from_str)?,
        total_fees: row.get(8)?,
        fees_paid: row.get(9)?,
        fees_pending: row.get(10)?,
        created_at: get_datetime(row, 11)?,
        updated_at: get_datetime(row, 12)?,
    })
}
