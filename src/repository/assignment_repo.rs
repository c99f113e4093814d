// ==========================================
// 学校教务核心 - 分配关系仓储
// ==========================================
// 表: assignment（四种多对多关系共用）
// 红线: 不提供 DELETE，移除只改状态
// 红线: 容量/主讲/班主任等规则在 engine/api 层判定
// ==========================================

use crate::domain::assignment::{Assignment, AssignmentAttrs, AssignmentKey};
use crate::domain::types::{AssignmentStatus, RelationKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, get_date, get_datetime, get_enum, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const SELECT_COLUMNS: &str = r#"
    SELECT id, relation_kind, owner_id, target_id, academic_year_id, assigned_date,
           status, is_primary_teacher, is_class_teacher, grade, notes, created_at, updated_at
    FROM assignment
"#;

// 生效状态集合（与 AssignmentStatus::is_active 一致）
const ACTIVE_STATUS_SQL: &str = "status IN ('ASSIGNED', 'ENROLLED')";

// ==========================================
// AssignmentRepository - 分配仓储
// ==========================================
pub struct AssignmentRepository {
    conn: SharedConnection,
}

impl AssignmentRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 写操作（事务内）
    // ==========================================

    pub fn insert_tx(
        conn: &Connection,
        key: &AssignmentKey,
        status: AssignmentStatus,
        assigned_date: NaiveDate,
        attrs: &AssignmentAttrs,
    ) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO assignment (
                relation_kind, owner_id, target_id, academic_year_id, assigned_date, status,
                is_primary_teacher, is_class_teacher, grade, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)"#,
            params![
                key.relation_kind.to_db_str(),
                key.owner_id,
                key.target_id,
                key.academic_year_id,
                fmt_date(assigned_date),
                status.to_db_str(),
                attrs.is_primary_teacher,
                attrs.is_class_teacher,
                attrs.grade,
                attrs.notes,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 原地更新状态与属性（grade/notes 为空时保留原值）
    pub fn update_tx(
        conn: &Connection,
        id: i64,
        status: AssignmentStatus,
        assigned_date: NaiveDate,
        attrs: &AssignmentAttrs,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE assignment
               SET status = ?1, assigned_date = ?2, is_primary_teacher = ?3,
                   is_class_teacher = ?4, grade = COALESCE(?5, grade),
                   notes = COALESCE(?6, notes), updated_at = ?7
               WHERE id = ?8"#,
            params![
                status.to_db_str(),
                fmt_date(assigned_date),
                attrs.is_primary_teacher,
                attrs.is_class_teacher,
                attrs.grade,
                attrs.notes,
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Assignment", id));
        }
        Ok(())
    }

    /// 改状态；失效时同时清除主讲/班主任标志
    pub fn set_status_tx(conn: &Connection, id: i64, status: AssignmentStatus) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE assignment
               SET status = ?1,
                   is_primary_teacher = CASE WHEN ?2 THEN is_primary_teacher ELSE 0 END,
                   is_class_teacher = CASE WHEN ?2 THEN is_class_teacher ELSE 0 END,
                   updated_at = ?3
               WHERE id = ?4"#,
            params![status.to_db_str(), status.is_active(), now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Assignment", id));
        }
        Ok(())
    }

    pub fn set_grade_tx(conn: &Connection, id: i64, grade: &str) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE assignment SET grade = ?1, updated_at = ?2 WHERE id = ?3",
            params![grade.trim(), now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Assignment", id));
        }
        Ok(())
    }

    /// 清除同一目标下其他行的标志位
    ///
    /// flag_column 只接受内部常量 is_primary_teacher / is_class_teacher
    fn clear_flag_except_tx(
        conn: &Connection,
        flag_column: &str,
        kind: RelationKind,
        target_id: i64,
        academic_year_id: i64,
        except_id: Option<i64>,
    ) -> RepositoryResult<usize> {
        let sql = format!(
            r#"UPDATE assignment SET {col} = 0, updated_at = ?1
               WHERE relation_kind = ?2 AND target_id = ?3 AND academic_year_id = ?4
                 AND {col} = 1 AND (?5 IS NULL OR id <> ?5)"#,
            col = flag_column
        );
        Ok(conn.execute(
            &sql,
            params![now_ts(), kind.to_db_str(), target_id, academic_year_id, except_id],
        )?)
    }

    pub fn clear_primary_teacher_tx(
        conn: &Connection,
        subject_id: i64,
        academic_year_id: i64,
        except_id: Option<i64>,
    ) -> RepositoryResult<usize> {
        Self::clear_flag_except_tx(
            conn,
            "is_primary_teacher",
            RelationKind::TeacherSubject,
            subject_id,
            academic_year_id,
            except_id,
        )
    }

    pub fn clear_class_teacher_tx(
        conn: &Connection,
        class_id: i64,
        academic_year_id: i64,
        except_id: Option<i64>,
    ) -> RepositoryResult<usize> {
        Self::clear_flag_except_tx(
            conn,
            "is_class_teacher",
            RelationKind::TeacherClass,
            class_id,
            academic_year_id,
            except_id,
        )
    }

    // ==========================================
    // 查询（事务内）
    // ==========================================

    pub fn find_by_key_tx(conn: &Connection, key: &AssignmentKey) -> RepositoryResult<Option<Assignment>> {
        let sql = format!(
            "{} WHERE relation_kind = ?1 AND owner_id = ?2 AND target_id = ?3 AND academic_year_id = ?4",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(
                &sql,
                params![
                    key.relation_kind.to_db_str(),
                    key.owner_id,
                    key.target_id,
                    key.academic_year_id
                ],
                map_row,
            )
            .optional()?)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<Assignment>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }

    /// 目标（班级/学科）在某学年的生效行数
    pub fn count_active_for_target_tx(
        conn: &Connection,
        kind: RelationKind,
        target_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM assignment
             WHERE relation_kind = ?1 AND target_id = ?2 AND academic_year_id = ?3 AND {}",
            ACTIVE_STATUS_SQL
        );
        Ok(conn.query_row(
            &sql,
            params![kind.to_db_str(), target_id, academic_year_id],
            |row| row.get(0),
        )?)
    }

    /// 主体（教师/学生）在某学年的所有行（含失效行）
    pub fn list_for_owner_tx(
        conn: &Connection,
        kind: RelationKind,
        owner_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<Vec<Assignment>> {
        let sql = format!(
            "{} WHERE relation_kind = ?1 AND owner_id = ?2 AND academic_year_id = ?3 ORDER BY target_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind.to_db_str(), owner_id, academic_year_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_active_for_target_tx(
        conn: &Connection,
        kind: RelationKind,
        target_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<Vec<Assignment>> {
        let sql = format!(
            "{} WHERE relation_kind = ?1 AND target_id = ?2 AND academic_year_id = ?3 AND {} ORDER BY owner_id",
            SELECT_COLUMNS, ACTIVE_STATUS_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind.to_db_str(), target_id, academic_year_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 某学年各目标的生效行数（报表用）
    pub fn active_counts_by_target_tx(
        conn: &Connection,
        kind: RelationKind,
        academic_year_id: i64,
    ) -> RepositoryResult<HashMap<i64, i64>> {
        let sql = format!(
            "SELECT target_id, COUNT(*) FROM assignment
             WHERE relation_kind = ?1 AND academic_year_id = ?2 AND {}
             GROUP BY target_id",
            ACTIVE_STATUS_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.to_db_str(), academic_year_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (target_id, count) = row?;
            counts.insert(target_id, count);
        }
        Ok(counts)
    }

    /// 某学年各主体的生效行数（工作量统计用）
    pub fn active_counts_by_owner_tx(
        conn: &Connection,
        kind: RelationKind,
        academic_year_id: i64,
    ) -> RepositoryResult<HashMap<i64, i64>> {
        let sql = format!(
            "SELECT owner_id, COUNT(*) FROM assignment
             WHERE relation_kind = ?1 AND academic_year_id = ?2 AND {}
             GROUP BY owner_id",
            ACTIVE_STATUS_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.to_db_str(), academic_year_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (owner_id, count) = row?;
            counts.insert(owner_id, count);
        }
        Ok(counts)
    }

    /// 教师所教班级的在读学生总数（按学年）
    pub fn students_taught_by_teacher_tx(
        conn: &Connection,
        teacher_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            r#"SELECT COUNT(DISTINCT sc.owner_id)
               FROM assignment tc
               JOIN assignment sc
                 ON sc.relation_kind = 'STUDENT_CLASS'
                AND sc.target_id = tc.target_id
                AND sc.academic_year_id = tc.academic_year_id
                AND sc.status = 'ENROLLED'
               WHERE tc.relation_kind = 'TEACHER_CLASS'
                 AND tc.owner_id = ?1 AND tc.academic_year_id = ?2
                 AND tc.status = 'ASSIGNED'"#,
            params![teacher_id, academic_year_id],
            |row| row.get(0),
        )?)
    }

    /// 将主体在所有学年的生效行置为失效（档案停用时级联）
    pub fn deactivate_all_for_owner_tx(
        conn: &Connection,
        kind: RelationKind,
        owner_id: i64,
    ) -> RepositoryResult<usize> {
        let sql = format!(
            r#"UPDATE assignment
               SET status = ?1, is_primary_teacher = 0, is_class_teacher = 0, updated_at = ?2
               WHERE relation_kind = ?3 AND owner_id = ?4 AND {}"#,
            ACTIVE_STATUS_SQL
        );
        Ok(conn.execute(
            &sql,
            params![kind.inactive_status().to_db_str(), now_ts(), kind.to_db_str(), owner_id],
        )?)
    }

    // ==========================================
    // 独立查询（自行加锁）
    // ==========================================

    pub fn find_by_key(&self, key: &AssignmentKey) -> RepositoryResult<Option<Assignment>> {
        let conn = lock(&self.conn)?;
        Self::find_by_key_tx(&conn, key)
    }

    pub fn list_for_owner(
        &self,
        kind: RelationKind,
        owner_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<Vec<Assignment>> {
        let conn = lock(&self.conn)?;
        Self::list_for_owner_tx(&conn, kind, owner_id, academic_year_id)
    }

    pub fn list_active_for_target(
        &self,
        kind: RelationKind,
        target_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<Vec<Assignment>> {
        let conn = lock(&self.conn)?;
        Self::list_active_for_target_tx(&conn, kind, target_id, academic_year_id)
    }

    pub fn count_active_for_target(
        &self,
        kind: RelationKind,
        target_id: i64,
        academic_year_id: i64,
    ) -> RepositoryResult<i64> {
        let conn = lock(&self.conn)?;
        Self::count_active_for_target_tx(&conn, kind, target_id, academic_year_id)
    }
}

fn map_row(row: &Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        relation_kind: get_enum(row, 1, RelationKind::from_str)?,
        owner_id: row.get(2)?,
        target_id: row.get(3)?,
        academic_year_id: row.get(4)?,
        assigned_date: get_date(row, 5)?,
        status: get_enum(row, 6, AssignmentStatus::from_str)?,
        is_primary_teacher: row.get(7)?,
        is_class_teacher: row.get(8)?,
        grade: row.get(9)?,
        notes: row.get(10)?,
        created_at: get_datetime(row, 11)?,
        updated_at: get_datetime(row, 12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::academic_year::AcademicYearDraft;
    use crate::repository::academic_year_repo::AcademicYearRepository;

    fn setup() -> (Connection, i64) {
        let conn = crate::db::open_in_memory().unwrap();
        let year = AcademicYearRepository::insert_tx(
            &conn,
            &AcademicYearDraft::new(
                "2024-2025",
                NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            ),
        )
        .unwrap();
        (conn, year)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    #[test]
    fn test_duplicate_key_is_rejected_by_unique_index() {
        let (conn, year) = setup();
        let key = AssignmentKey::new(RelationKind::StudentClass, 1, 10, year);
        let attrs = AssignmentAttrs::default();
        AssignmentRepository::insert_tx(&conn, &key, AssignmentStatus::Enrolled, day(), &attrs).unwrap();
        let err = AssignmentRepository::insert_tx(&conn, &key, AssignmentStatus::Enrolled, day(), &attrs)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_count_active_ignores_dropped_rows() {
        let (conn, year) = setup();
        let attrs = AssignmentAttrs::default();
        let a = AssignmentRepository::insert_tx(
            &conn,
            &AssignmentKey::new(RelationKind::StudentClass, 1, 10, year),
            AssignmentStatus::Enrolled,
            day(),
            &attrs,
        )
        .unwrap();
        AssignmentRepository::insert_tx(
            &conn,
            &AssignmentKey::new(RelationKind::StudentClass, 2, 10, year),
            AssignmentStatus::Enrolled,
            day(),
            &attrs,
        )
        .unwrap();
        AssignmentRepository::set_status_tx(&conn, a, AssignmentStatus::Dropped).unwrap();

        let n = AssignmentRepository::count_active_for_target_tx(&conn, RelationKind::StudentClass, 10, year)
            .unwrap();
        assert_eq!(n, 1);
        // 失效行保留
        let row = AssignmentRepository::find_by_id_tx(&conn, a).unwrap().unwrap();
        assert_eq!(row.status, AssignmentStatus::Dropped);
    }

    #[test]
    fn test_clear_primary_teacher_keeps_excepted_row() {
        let (conn, year) = setup();
        let a = AssignmentRepository::insert_tx(
            &conn,
            &AssignmentKey::new(RelationKind::TeacherSubject, 1, 5, year),
            AssignmentStatus::Assigned,
            day(),
            &AssignmentAttrs::primary_teacher(),
        )
        .unwrap();
        let b = AssignmentRepository::insert_tx(
            &conn,
            &AssignmentKey::new(RelationKind::TeacherSubject, 2, 5, year),
            AssignmentStatus::Assigned,
            day(),
            &AssignmentAttrs::primary_teacher(),
        )
        .unwrap();

        let cleared = AssignmentRepository::clear_primary_teacher_tx(&conn, 5, year, Some(b)).unwrap();
        assert_eq!(cleared, 1);
        assert!(!AssignmentRepository::find_by_id_tx(&conn, a).unwrap().unwrap().is_primary_teacher);
        assert!(AssignmentRepository::find_by_id_tx(&conn, b).unwrap().unwrap().is_primary_teacher);
    }
}
