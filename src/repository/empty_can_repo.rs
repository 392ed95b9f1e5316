// ==========================================
// 精酿啤酒灌装台账系统 - 空罐入库批次仓储
// ==========================================
// 批次行只插入, 不更新
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::inventory::EmptyCanBatch;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct EmptyCanBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmptyCanBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<EmptyCanBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                "SELECT id, quantity, provider, lot, received_at FROM empty_can_batch WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(batch)
    }

    /// 全部批次（入库时间正序）
    pub fn list_all(&self) -> RepositoryResult<Vec<EmptyCanBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, quantity, provider, lot, received_at FROM empty_can_batch
             ORDER BY received_at, rowid",
        )?;
        let batches = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    pub fn insert_tx(conn: &Connection, batch: &EmptyCanBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO empty_can_batch (id, quantity, provider, lot, received_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                batch.id,
                batch.quantity,
                batch.provider,
                batch.lot,
                format_ts(&batch.received_at),
            ],
        )?;
        Ok(())
    }

    /// 入库总量
    pub fn total_received_tx(conn: &Connection) -> RepositoryResult<i64> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM empty_can_batch",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<EmptyCanBatch> {
        let received_raw: String = row.get(4)?;
        Ok(EmptyCanBatch {
            id: row.get(0)?,
            quantity: row.get(1)?,
            provider: row.get(2)?,
            lot: row.get(3)?,
            received_at: parse_ts(4, &received_raw)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_insert_and_total() {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory().unwrap()));
        let repo = EmptyCanBatchRepository::new(Arc::clone(&conn));
        let batch = EmptyCanBatch {
            id: "B1".to_string(),
            quantity: 240,
            provider: Some("Latas del Sur".to_string()),
            lot: Some("L-77".to_string()),
            received_at: Utc::now().naive_utc(),
        };
        EmptyCanBatchRepository::insert_tx(&conn.lock().unwrap(), &batch).unwrap();

        let found = repo.find_by_id("B1").unwrap().unwrap();
        assert_eq!(found.quantity, 240);
        assert_eq!(found.lot.as_deref(), Some("L-77"));
        assert!(repo.find_by_id("missing").unwrap().is_none());
        assert_eq!(
            EmptyCanBatchRepository::total_received_tx(&conn.lock().unwrap()).unwrap(),
            240
        );
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }
}
