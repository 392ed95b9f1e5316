// ==========================================
// 精酿啤酒灌装台账系统 - 标签入库批次仓储
// ==========================================
// 身份拆分为 is_custom / brand_id / style_id / label_name 四列存储
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::label::{LabelBatch, LabelIdentity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, is_custom, brand_id, style_id, label_name, quantity, provider, lot, received_at
    FROM label_batch
"#;

pub struct LabelBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LabelBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 某身份的全部入库批次（入库时间正序）
    pub fn list_by_identity(&self, identity: &LabelIdentity) -> RepositoryResult<Vec<LabelBatch>> {
        let conn = self.get_conn()?;
        let batches = match identity {
            LabelIdentity::Catalog { brand_id, style_id } => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE is_custom = 0 AND brand_id = ?1 AND style_id = ?2
                     ORDER BY received_at, rowid",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![brand_id, style_id], Self::map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            LabelIdentity::Custom { name } => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE is_custom = 1 AND label_name = ?1 ORDER BY received_at, rowid",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![name], Self::map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(batches.into_iter().flatten().collect())
    }

    pub fn insert_tx(conn: &Connection, batch: &LabelBatch) -> RepositoryResult<()> {
        let (brand_id, style_id, label_name) = batch.identity.to_columns();
        conn.execute(
            r#"
            INSERT INTO label_batch (
                id, is_custom, brand_id, style_id, label_name,
                quantity, provider, lot, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                batch.id,
                batch.identity.is_custom(),
                brand_id,
                style_id,
                label_name,
                batch.quantity,
                batch.provider,
                batch.lot,
                format_ts(&batch.received_at),
            ],
        )?;
        Ok(())
    }

    /// 按身份分组的入库总量
    pub fn received_totals_tx(conn: &Connection) -> RepositoryResult<Vec<(LabelIdentity, i64)>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT is_custom, brand_id, style_id, label_name, SUM(quantity)
            FROM label_batch
            GROUP BY is_custom, brand_id, style_id, label_name
            ORDER BY is_custom, brand_id, style_id, label_name
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                let identity = LabelIdentity::from_columns(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                );
                Ok((identity, row.get::<_, i64>(4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(identity, total)| identity.map(|i| (i, total)))
            .collect())
    }

    /// 行 → LabelBatch（身份列不完整的行返回 None）
    fn map_row(row: &Row<'_>) -> rusqlite::Result<Option<LabelBatch>> {
        let identity = LabelIdentity::from_columns(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?);
        let id: String = row.get(0)?;
        let quantity: i64 = row.get(5)?;
        let provider: Option<String> = row.get(6)?;
        let lot: Option<String> = row.get(7)?;
        let received_raw: String = row.get(8)?;
        let received_at = parse_ts(8, &received_raw)?;

        Ok(identity.map(|identity| LabelBatch {
            id,
            identity,
            quantity,
            provider,
            lot,
            received_at,
        }))
    }
}
