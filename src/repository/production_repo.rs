// ==========================================
// 精酿啤酒灌装台账系统 - 生产批次仓储
// ==========================================
// 职责: production / production_history 两张表的数据映射
// 红线: 不做状态校验, 状态规则由引擎层负责
// 说明: 删除批次时历史记录由外键级联删除
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::production::{FinishedKey, Production, ProductionHistoryEntry};
use crate::domain::types::ProductionStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, brand_id, style_id, quantity, status,
           label_brand_id, label_style_id, label_name, created_at, updated_at
    FROM production
"#;

/// 在制品汇总过滤条件（按批次自身品牌/款式与创建时间）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InProcessFilter {
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

// ==========================================
// ProductionRepository - 生产批次仓储
// ==========================================
pub struct ProductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 结构体方法（独立读取）
    // ==========================================

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Production>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    /// 查询批次列表（创建时间正序, 可按状态过滤）
    pub fn list(&self, status: Option<ProductionStatus>) -> RepositoryResult<Vec<Production>> {
        let conn = self.get_conn()?;
        Self::list_tx(&conn, status)
    }

    /// 批次历史（时间正序）
    pub fn list_history(&self, production_id: &str) -> RepositoryResult<Vec<ProductionHistoryEntry>> {
        let conn = self.get_conn()?;
        Self::list_history_tx(&conn, production_id)
    }

    // ==========================================
    // 事务内关联函数 - 写入
    // ==========================================

    pub fn insert_tx(conn: &Connection, production: &Production) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production (
                id, brand_id, style_id, quantity, status,
                label_brand_id, label_style_id, label_name, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                production.id,
                production.brand_id,
                production.style_id,
                production.quantity,
                production.status.as_str(),
                production.label_brand_id,
                production.label_style_id,
                production.label_name,
                format_ts(&production.created_at),
                format_ts(&production.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新可变字段（数量/状态/标签身份/更新时间）
    ///
    /// # 返回
    /// - `Err(NotFound)`: 批次不存在
    pub fn update_tx(conn: &Connection, production: &Production) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE production
            SET quantity = ?2, status = ?3,
                label_brand_id = ?4, label_style_id = ?5, label_name = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                production.id,
                production.quantity,
                production.status.as_str(),
                production.label_brand_id,
                production.label_style_id,
                production.label_name,
                format_ts(&production.updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Production".to_string(),
                id: production.id.clone(),
            });
        }
        Ok(())
    }

    /// 删除批次（历史级联删除）
    pub fn delete_tx(conn: &Connection, id: &str) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM production WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Production".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_history_tx(conn: &Connection, entry: &ProductionHistoryEntry) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO production_history (id, production_id, from_status, to_status, created_at, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.id,
                entry.production_id,
                entry.from_status.map(|s| s.as_str()),
                entry.to_status.as_str(),
                format_ts(&entry.created_at),
                entry.note,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 事务内关联函数 - 读取
    // ==========================================

    pub fn find_by_id_tx(conn: &Connection, id: &str) -> RepositoryResult<Option<Production>> {
        let production = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(production)
    }

    pub fn list_tx(
        conn: &Connection,
        status: Option<ProductionStatus>,
    ) -> RepositoryResult<Vec<Production>> {
        let mut sql = String::from(SELECT_COLUMNS);
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = status {
            sql.push_str(" WHERE status = ?1");
            values.push(Value::from(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 某成品键下的 FINAL 批次（最早创建优先）
    pub fn list_final_by_key_tx(conn: &Connection, key: FinishedKey) -> RepositoryResult<Vec<Production>> {
        let mut stmt = conn.prepare(&format!(
            r#"{}
            WHERE status = 'FINAL'
              AND COALESCE(label_brand_id, brand_id) = ?1
              AND COALESCE(label_style_id, style_id) = ?2
            ORDER BY created_at, rowid"#,
            SELECT_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![key.brand_id, key.style_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 按成品键分组的 FINAL 批次数量合计
    pub fn final_totals_by_key_tx(conn: &Connection) -> RepositoryResult<Vec<(FinishedKey, i64)>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(label_brand_id, brand_id) AS eb,
                   COALESCE(label_style_id, style_id) AS es,
                   SUM(quantity)
            FROM production
            WHERE status = 'FINAL'
            GROUP BY eb, es
            ORDER BY eb, es
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((FinishedKey::new(row.get(0)?, row.get(1)?), row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 在制品（非 FINAL）数量合计
    pub fn sum_in_process_tx(conn: &Connection, filter: &InProcessFilter) -> RepositoryResult<i64> {
        let mut sql = String::from(
            "SELECT COALESCE(SUM(quantity), 0) FROM production WHERE status <> 'FINAL'",
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(brand_id) = filter.brand_id {
            values.push(Value::from(brand_id));
            sql.push_str(&format!(" AND brand_id = ?{}", values.len()));
        }
        if let Some(style_id) = filter.style_id {
            values.push(Value::from(style_id));
            sql.push_str(&format!(" AND style_id = ?{}", values.len()));
        }
        if let Some(from) = filter.from {
            values.push(Value::from(format_ts(&from)));
            sql.push_str(&format!(" AND created_at >= ?{}", values.len()));
        }
        if let Some(to) = filter.to {
            values.push(Value::from(format_ts(&to)));
            sql.push_str(&format!(" AND created_at <= ?{}", values.len()));
        }

        let total: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(total)
    }

    pub fn list_history_tx(
        conn: &Connection,
        production_id: &str,
    ) -> RepositoryResult<Vec<ProductionHistoryEntry>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, production_id, from_status, to_status, created_at, note
            FROM production_history
            WHERE production_id = ?1
            ORDER BY created_at, rowid
            "#,
        )?;
        let items = stmt
            .query_map(params![production_id], Self::map_history_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 历史中出现过的目标状态
    pub fn visited_statuses_tx(
        conn: &Connection,
        production_id: &str,
    ) -> RepositoryResult<Vec<ProductionStatus>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT to_status FROM production_history WHERE production_id = ?1",
        )?;
        let raw = stmt
            .query_map(params![production_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(raw
            .iter()
            .filter_map(|s| ProductionStatus::parse(s))
            .collect())
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Production> {
        let status_raw: String = row.get(4)?;
        let status = parse_status(4, &status_raw)?;
        let created_raw: String = row.get(8)?;
        let updated_raw: String = row.get(9)?;

        Ok(Production {
            id: row.get(0)?,
            brand_id: row.get(1)?,
            style_id: row.get(2)?,
            quantity: row.get(3)?,
            status,
            label_brand_id: row.get(5)?,
            label_style_id: row.get(6)?,
            label_name: row.get(7)?,
            created_at: parse_ts(8, &created_raw)?,
            updated_at: parse_ts(9, &updated_raw)?,
        })
    }

    fn map_history_row(row: &Row<'_>) -> rusqlite::Result<ProductionHistoryEntry> {
        let from_raw: Option<String> = row.get(2)?;
        let from_status = match from_raw {
            Some(raw) => Some(parse_status(2, &raw)?),
            None => None,
        };
        let to_raw: String = row.get(3)?;
        let created_raw: String = row.get(4)?;

        Ok(ProductionHistoryEntry {
            id: row.get(0)?,
            production_id: row.get(1)?,
            from_status,
            to_status: parse_status(3, &to_raw)?,
            created_at: parse_ts(4, &created_raw)?,
            note: row.get(5)?,
        })
    }
}

fn parse_status(idx: usize, raw: &str) -> rusqlite::Result<ProductionStatus> {
    ProductionStatus::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("未知批次状态: {}", raw).into(),
        )
    })
}
