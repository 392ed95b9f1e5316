// ==========================================
// 精酿啤酒灌装台账系统 - 发货记录仓储
// ==========================================
// 红线: 发货记录只创建, 不更新
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::delivery::DeliveryRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct DeliveryRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DeliveryRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 某发货单的全部记录（按插入顺序）
    pub fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<DeliveryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, order_id, client, item_code, brand_id, style_id, quantity, operator, delivered_at
            FROM delivery_record
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )?;
        let items = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn insert_tx(conn: &Connection, record: &DeliveryRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO delivery_record (
                id, order_id, client, item_code, brand_id, style_id, quantity, operator, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.order_id,
                record.client,
                record.item_code,
                record.brand_id,
                record.style_id,
                record.quantity,
                record.operator,
                format_ts(&record.delivered_at),
            ],
        )?;
        Ok(())
    }

    /// 发货单是否已有记录
    pub fn exists_for_order_tx(conn: &Connection, order_id: &str) -> RepositoryResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM delivery_record WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<DeliveryRecord> {
        let delivered_raw: String = row.get(8)?;
        Ok(DeliveryRecord {
            id: row.get(0)?,
            order_id: row.get(1)?,
            client: row.get(2)?,
            item_code: row.get(3)?,
            brand_id: row.get(4)?,
            style_id: row.get(5)?,
            quantity: row.get(6)?,
            operator: row.get(7)?,
            delivered_at: parse_ts(8, &delivered_raw)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_records_are_create_only() {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory().unwrap()));
        let repo = DeliveryRecordRepository::new(Arc::clone(&conn));
        let record = DeliveryRecord {
            id: "D1".to_string(),
            order_id: "R-0001".to_string(),
            client: Some("Bar Centro".to_string()),
            item_code: "IPA-473".to_string(),
            brand_id: 1,
            style_id: 2,
            quantity: 24,
            operator: "ana".to_string(),
            delivered_at: Utc::now().naive_utc(),
        };
        {
            let c = conn.lock().unwrap();
            DeliveryRecordRepository::insert_tx(&c, &record).unwrap();
            assert!(DeliveryRecordRepository::exists_for_order_tx(&c, "R-0001").unwrap());
            assert!(!DeliveryRecordRepository::exists_for_order_tx(&c, "R-0002").unwrap());

            let err: RepositoryError = c
                .execute("UPDATE delivery_record SET quantity = 1", [])
                .unwrap_err()
                .into();
            assert!(matches!(err, RepositoryError::AppendOnlyViolation(_)));
        }

        let listed = repo.list_by_order("R-0001").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client.as_deref(), Some("Bar Centro"));
    }
}
