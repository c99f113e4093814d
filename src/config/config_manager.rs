// ==========================================
// 学校教务核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// 约束: 写事务内读取配置必须使用 *_tx 版本（共享连接已被锁定）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::now_ts;
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const SCHOOL_NAME: &str = "school.name";
    pub const STUDENT_ID_PREFIX: &str = "student.id_prefix";
    pub const TEACHER_ID_PREFIX: &str = "teacher.id_prefix";
    pub const CLASS_DEFAULT_CAPACITY: &str = "class.default_capacity";
    pub const APP_LOCALE: &str = "app.locale";
}

pub const DEFAULT_SCHOOL_NAME: &str = "School";
pub const DEFAULT_STUDENT_ID_PREFIX: &str = "STU";
pub const DEFAULT_TEACHER_ID_PREFIX: &str = "TCH";
pub const DEFAULT_CLASS_CAPACITY: i32 = 30;
pub const DEFAULT_LOCALE: &str = "zh-CN";

// ==========================================
// SchoolSettings - 已解析的学校级配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolSettings {
    pub school_name: String,
    pub student_id_prefix: String,
    pub teacher_id_prefix: String,
    pub class_default_capacity: i32,
    pub locale: String,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        Self {
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            student_id_prefix: DEFAULT_STUDENT_ID_PREFIX.to_string(),
            teacher_id_prefix: DEFAULT_TEACHER_ID_PREFIX.to_string(),
            class_default_capacity: DEFAULT_CLASS_CAPACITY,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value_tx(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    fn get_or_default_tx(conn: &Connection, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(Self::get_value_tx(conn, key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取并解析全部学校级配置（格式错误时回退默认值并告警）
    pub fn settings_tx(conn: &Connection) -> RepositoryResult<SchoolSettings> {
        let raw_capacity = Self::get_or_default_tx(
            conn,
            config_keys::CLASS_DEFAULT_CAPACITY,
            &DEFAULT_CLASS_CAPACITY.to_string(),
        )?;
        let class_default_capacity = match raw_capacity.parse::<i32>() {
            Ok(v) if v > 0 => v,
            _ => {
                tracing::warn!(
                    config_key = config_keys::CLASS_DEFAULT_CAPACITY,
                    raw_value = %raw_capacity,
                    "默认班级容量配置无效，使用默认值"
                );
                DEFAULT_CLASS_CAPACITY
            }
        };

        Ok(SchoolSettings {
            school_name: Self::get_or_default_tx(conn, config_keys::SCHOOL_NAME, DEFAULT_SCHOOL_NAME)?,
            student_id_prefix: Self::get_or_default_tx(
                conn,
                config_keys::STUDENT_ID_PREFIX,
                DEFAULT_STUDENT_ID_PREFIX,
            )?
            .to_uppercase(),
            teacher_id_prefix: Self::get_or_default_tx(
                conn,
                config_keys::TEACHER_ID_PREFIX,
                DEFAULT_TEACHER_ID_PREFIX,
            )?
            .to_uppercase(),
            class_default_capacity,
            locale: Self::get_or_default_tx(conn, config_keys::APP_LOCALE, DEFAULT_LOCALE)?,
        })
    }

    pub fn set_value_tx(conn: &Connection, key: &str, value: &str) -> RepositoryResult<()> {
        if key.trim().is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "key".to_string(),
                message: "config key must not be empty".to_string(),
            });
        }
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.trim(), value, now_ts()],
        )?;
        Ok(())
    }

    // ==========================================
    // 独立操作（自行加锁）
    // ==========================================

    pub fn get_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock(&self.conn)?;
        Self::get_value_tx(&conn, key)
    }

    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = lock(&self.conn)?;
        Self::set_value_tx(&conn, key, value)
    }

    pub fn settings(&self) -> RepositoryResult<SchoolSettings> {
        let conn = lock(&self.conn)?;
        Self::settings_tx(&conn)
    }

    /// 获取所有配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::transaction::share;

    fn manager() -> ConfigManager {
        ConfigManager::new(share(crate::db::open_in_memory().unwrap()))
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = manager().settings().unwrap();
        assert_eq!(settings, SchoolSettings::default());
    }

    #[test]
    fn test_set_value_overrides_and_normalizes() {
        let config = manager();
        config.set_value(config_keys::STUDENT_ID_PREFIX, "std").unwrap();
        config.set_value(config_keys::CLASS_DEFAULT_CAPACITY, "40").unwrap();
        config.set_value(config_keys::CLASS_DEFAULT_CAPACITY, "35").unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.student_id_prefix, "STD");
        assert_eq!(settings.class_default_capacity, 35);
        assert_eq!(config.get_config_snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_capacity_falls_back_to_default() {
        let config = manager();
        config.set_value(config_keys::CLASS_DEFAULT_CAPACITY, "-3").unwrap();
        assert_eq!(config.settings().unwrap().class_default_capacity, DEFAULT_CLASS_CAPACITY);
    }
}
