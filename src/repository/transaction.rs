// ==========================================
// 学校教务核心 - 事务边界
// ==========================================
// 红线: 多步写操作必须在单一事务内完成，任一步失败整体回滚
// 约束: 闭包内只能调用 *_tx 关联函数（共享连接已被锁定）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

/// 进程内共享连接
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 包装已打开的连接
pub fn share(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// 获取共享连接的锁
pub fn lock(conn: &SharedConnection) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

/// 在事务中执行闭包
///
/// # 说明
/// - 闭包返回 Ok 时提交；返回 Err 时事务随 drop 回滚
/// - 写入前需要“先读后写”校验的操作（容量、当前学年）使用
///   `TransactionBehavior::Immediate`，在 BEGIN 时即持有写锁
pub fn with_transaction<T, E, F>(
    conn: &SharedConnection,
    behavior: TransactionBehavior,
    f: F,
) -> Result<T, E>
where
    E: From<RepositoryError>,
    F: FnOnce(&Transaction) -> Result<T, E>,
{
    let mut guard = lock(conn).map_err(E::from)?;
    let tx = guard
        .transaction_with_behavior(behavior)
        .map_err(|e| E::from(RepositoryError::DatabaseTransactionError(e.to_string())))?;

    let value = f(&tx)?;

    tx.commit()
        .map_err(|e| E::from(RepositoryError::DatabaseTransactionError(e.to_string())))?;
    Ok(value)
}

/// 写事务（IMMEDIATE）
pub fn write_transaction<T, E, F>(conn: &SharedConnection, f: F) -> Result<T, E>
where
    E: From<RepositoryError>,
    F: FnOnce(&Transaction) -> Result<T, E>,
{
    with_transaction(conn, TransactionBehavior::Immediate, f)
}
