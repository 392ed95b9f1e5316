// ==========================================
// 精酿啤酒灌装台账系统 - 台账流水仓储
// ==========================================
// 红线: 只提供追加与查询, 不提供 UPDATE / DELETE
// 表级触发器同样拒绝修改
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::movement::{MovementEntry, MovementFilter, MovementPage, PageRequest};
use crate::domain::production::FinishedKey;
use crate::domain::types::{MovementType, ProductionStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, movement_type, reference_id, quantity, provider, lot,
           brand_id, style_id, label_name, production_status, detail, created_at
    FROM movement
"#;

// ==========================================
// MovementSumFilter - 汇总过滤条件
// ==========================================
/// 按池键维度汇总流水数量的过滤条件
///
/// - `catalog_only`: 只统计 label_name 为空的记录（目录标签）
/// - `label_name`: 只统计该名称的记录（自定义标签）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementSumFilter {
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub label_name: Option<String>,
    pub catalog_only: bool,
    pub production_status: Option<ProductionStatus>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

/// 动态 WHERE 子句
struct WhereClause {
    sql: String,
    values: Vec<Value>,
}

impl WhereClause {
    fn new() -> Self {
        Self {
            sql: String::from(" WHERE 1=1"),
            values: Vec::new(),
        }
    }

    fn push(&mut self, fragment: &str, value: Value) {
        self.values.push(value);
        self.sql
            .push_str(&fragment.replace("{}", &format!("?{}", self.values.len())));
    }

    fn push_range(&mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) {
        if let Some(from) = from {
            self.push(" AND created_at >= {}", Value::from(format_ts(&from)));
        }
        if let Some(to) = to {
            self.push(" AND created_at <= {}", Value::from(format_ts(&to)));
        }
    }
}

// ==========================================
// MovementRepository - 台账流水仓储
// ==========================================
pub struct MovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MovementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 结构体方法（独立读写, 自行加锁）
    // ==========================================

    pub fn append(&self, entry: &MovementEntry) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::append_tx(&conn, entry)
    }

    pub fn query(&self, filter: &MovementFilter, page: PageRequest) -> RepositoryResult<MovementPage> {
        let conn = self.get_conn()?;
        Self::query_tx(&conn, filter, page)
    }

    pub fn list_by_reference(&self, reference_id: &str) -> RepositoryResult<Vec<MovementEntry>> {
        let conn = self.get_conn()?;
        Self::list_by_reference_tx(&conn, reference_id)
    }

    pub fn sum(&self, movement_type: MovementType, filter: &MovementSumFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::sum_tx(&conn, movement_type, filter)
    }

    // ==========================================
    // 事务内关联函数
    // ==========================================

    /// 追加一条流水
    ///
    /// # 返回
    /// - `Err(FieldValueError)`: 数量不为正
    pub fn append_tx(conn: &Connection, entry: &MovementEntry) -> RepositoryResult<()> {
        if entry.quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!(
                    "流水数量必须为正数: type={}, quantity={}",
                    entry.movement_type, entry.quantity
                ),
            });
        }

        conn.execute(
            r#"
            INSERT INTO movement (
                id, movement_type, reference_id, quantity, provider, lot,
                brand_id, style_id, label_name, production_status, detail, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                entry.id,
                entry.movement_type.as_str(),
                entry.reference_id,
                entry.quantity,
                entry.provider,
                entry.lot,
                entry.brand_id,
                entry.style_id,
                entry.label_name,
                entry.production_status.map(|s| s.as_str()),
                entry.detail,
                format_ts(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    /// 分页查询流水（时间倒序, 同一时间按插入顺序倒序）
    pub fn query_tx(
        conn: &Connection,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> RepositoryResult<MovementPage> {
        let mut clause = WhereClause::new();
        if let Some(t) = filter.movement_type {
            clause.push(" AND movement_type = {}", Value::from(t.as_str().to_string()));
        }
        if let Some(prefix) = filter.reference_id_prefix.as_deref().filter(|p| !p.is_empty()) {
            clause.push(
                " AND substr(reference_id, 1, length({})) = {}",
                Value::from(prefix.to_string()),
            );
        }
        clause.push_range(filter.from, filter.to);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM movement{}", clause.sql),
            params_from_iter(clause.values.iter()),
            |row| row.get(0),
        )?;

        let mut values = clause.values.clone();
        let limit_idx = values.len() + 1;
        values.push(Value::from(i64::from(page.page_size)));
        values.push(Value::from(page.offset()));
        let sql = format!(
            "{}{} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            SELECT_COLUMNS,
            clause.sql,
            limit_idx,
            limit_idx + 1
        );

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MovementPage {
            items,
            total,
            page: page.page.max(1),
            page_size: page.page_size,
        })
    }

    /// 按引用查询全部流水（时间正序）
    pub fn list_by_reference_tx(
        conn: &Connection,
        reference_id: &str,
    ) -> RepositoryResult<Vec<MovementEntry>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE reference_id = ?1 ORDER BY created_at, rowid",
            SELECT_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![reference_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 汇总某类型流水数量
    pub fn sum_tx(
        conn: &Connection,
        movement_type: MovementType,
        filter: &MovementSumFilter,
    ) -> RepositoryResult<i64> {
        let mut clause = WhereClause::new();
        clause.push(
            " AND movement_type = {}",
            Value::from(movement_type.as_str().to_string()),
        );
        if let Some(brand_id) = filter.brand_id {
            clause.push(" AND brand_id = {}", Value::from(brand_id));
        }
        if let Some(style_id) = filter.style_id {
            clause.push(" AND style_id = {}", Value::from(style_id));
        }
        if let Some(name) = filter.label_name.as_deref() {
            clause.push(" AND label_name = {}", Value::from(name.to_string()));
        }
        if filter.catalog_only {
            clause.sql.push_str(" AND label_name IS NULL");
        }
        if let Some(status) = filter.production_status {
            clause.push(
                " AND production_status = {}",
                Value::from(status.as_str().to_string()),
            );
        }
        clause.push_range(filter.from, filter.to);

        let total: i64 = conn.query_row(
            &format!("SELECT COALESCE(SUM(quantity), 0) FROM movement{}", clause.sql),
            params_from_iter(clause.values),
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 按成品键分组的台账净额 (PROD_FINAL_IN - PROD_FINAL_OUT - PROD_SCRAP, 仅 FINAL)
    pub fn finished_net_by_key_tx(conn: &Connection) -> RepositoryResult<Vec<(FinishedKey, i64)>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT brand_id, style_id,
                   SUM(CASE movement_type WHEN 'PROD_FINAL_IN' THEN quantity ELSE -quantity END)
            FROM movement
            WHERE production_status = 'FINAL'
              AND movement_type IN ('PROD_FINAL_IN', 'PROD_FINAL_OUT', 'PROD_SCRAP')
              AND brand_id IS NOT NULL AND style_id IS NOT NULL
            GROUP BY brand_id, style_id
            ORDER BY brand_id, style_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((FinishedKey::new(row.get(0)?, row.get(1)?), row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 数据库行 → MovementEntry
    fn map_row(row: &Row<'_>) -> rusqlite::Result<MovementEntry> {
        let type_raw: String = row.get(1)?;
        let movement_type = MovementType::parse(&type_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("未知流水类型: {}", type_raw).into(),
            )
        })?;
        let status_raw: Option<String> = row.get(9)?;
        let created_raw: String = row.get(11)?;

        Ok(MovementEntry {
            id: row.get(0)?,
            movement_type,
            reference_id: row.get(2)?,
            quantity: row.get(3)?,
            provider: row.get(4)?,
            lot: row.get(5)?,
            brand_id: row.get(6)?,
            style_id: row.get(7)?,
            label_name: row.get(8)?,
            production_status: status_raw.as_deref().and_then(ProductionStatus::parse),
            detail: row.get(10)?,
            created_at: parse_ts(11, &created_raw)?,
        })
    }
}
