use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::fmt_datetime;
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection};
use std::sync::MutexGuard;

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: SharedConnection,
}

impl ActionLogRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在调用方事务内插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入
    /// - `Err(...)`: 数据库错误（调用方事务整体回滚）
    pub fn insert_tx(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        let payload = match &log.payload_json {
            Some(v) => Some(serde_json::to_string(v).map_err(|e| RepositoryError::FieldValueError {
                field: "payload_json".to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor,
                target_kind, target_id, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.action_id,
                log.action_type.to_db_str(),
                fmt_datetime(log.action_ts),
                log.actor,
                log.target_kind.to_db_str(),
                log.target_id,
                payload,
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 独立插入（非事务场景，如系统事件）
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, log)
    }
}
