use super::core::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::EntityKind;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::{get_datetime, get_enum};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, action_type, action_ts, actor,
           target_kind, target_id, payload_json, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE action_id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![action_id], map_row).optional()?)
    }

    /// 查询某个实体的全部日志（新→旧）
    pub fn find_by_target(&self, kind: EntityKind, target_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE target_kind = ?1 AND target_id = ?2 ORDER BY action_ts DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![kind.to_db_str(), target_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询最近 N 条日志
    pub fn find_recent(&self, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY action_ts DESC, rowid DESC LIMIT ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count_by_type(&self, action_type: ActionType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::count_by_type_tx(&conn, action_type)
    }

    pub fn count_by_type_tx(conn: &Connection, action_type: ActionType) -> RepositoryResult<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?1",
            params![action_type.to_db_str()],
            |row| row.get(0),
        )?)
    }
}

fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload: Option<String> = row.get(6)?;
    let payload_json = match payload {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: get_enum(row, 1, ActionType::from_str)?,
        action_ts: get_datetime(row, 2)?,
        actor: row.get(3)?,
        target_kind: get_enum(row, 4, EntityKind::from_str)?,
        target_id: row.get(5)?,
        payload_json,
        detail: row.get(7)?,
    })
}
