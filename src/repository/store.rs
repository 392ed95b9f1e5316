// ==========================================
// 精酿啤酒灌装台账系统 - 共享连接与事务单元
// ==========================================
// 所有仓储共享同一个 Arc<Mutex<Connection>>
// 写操作通过 in_transaction 进入 BEGIN IMMEDIATE 事务:
// 可用量检查之前即持有写锁, 检查与写入在同一把锁内完成
// ==========================================

use crate::db;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct LedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并确保表结构存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        db::ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 内存库（测试用）
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = db::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 共享连接句柄（用于构造各仓储）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在 IMMEDIATE 事务中执行工作单元
    ///
    /// # 说明
    /// - 闭包返回 Err 时事务随 drop 回滚, 返回 Ok 时提交
    /// - 闭包内只能调用仓储的 `*_tx` 关联函数（结构体方法会重复加锁）
    pub fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let out = f(&tx)?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(out)
    }

    /// 只读访问（不开启事务）
    pub fn read<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_batches(store: &LedgerStore) -> i64 {
        store
            .read(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM empty_can_batch", [], |r| r.get(0))?)
            })
            .unwrap()
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let store = LedgerStore::in_memory().unwrap();
        store
            .in_transaction(|tx| -> RepositoryResult<()> {
                tx.execute(
                    "INSERT INTO empty_can_batch (id, quantity, received_at)
                     VALUES ('b1', 10, '2026-01-01 00:00:00.000000')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count_batches(&store), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let store = LedgerStore::in_memory().unwrap();
        let result = store.in_transaction(|tx| -> RepositoryResult<()> {
            tx.execute(
                "INSERT INTO empty_can_batch (id, quantity, received_at)
                 VALUES ('b1', 10, '2026-01-01 00:00:00.000000')",
                [],
            )?;
            Err(RepositoryError::ValidationError("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count_batches(&store), 0);
    }
}
