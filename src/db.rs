// ==========================================
// 精酿啤酒灌装台账系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有连接的 PRAGMA 行为（外键级联依赖 foreign_keys）
// - 统一 busy_timeout, 并发写入时由 SQLite 排队等待
// - 统一建表语句与时间戳格式
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式（固定 6 位小数, 保证按文本排序即按时间排序）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// 时间戳解析格式（兼容无小数部分）
const TS_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（production_history 依赖级联删除）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（单元测试/演示用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 说明：
/// - movement / delivery_record 通过触发器拒绝 UPDATE / DELETE
/// - production_history 随 production 删除级联删除
/// - movement 不设外键, reference_id 为弱引用
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS empty_can_batch (
            id TEXT PRIMARY KEY,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            provider TEXT,
            lot TEXT,
            received_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS label_batch (
            id TEXT PRIMARY KEY,
            is_custom INTEGER NOT NULL DEFAULT 0,
            brand_id INTEGER,
            style_id INTEGER,
            label_name TEXT,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            provider TEXT,
            lot TEXT,
            received_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS production (
            id TEXT PRIMARY KEY,
            brand_id INTEGER NOT NULL,
            style_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            status TEXT NOT NULL
                CHECK (status IN ('ENLATADO', 'PAUSTERIZADO', 'ETIQUETADO', 'FINAL')),
            label_brand_id INTEGER,
            label_style_id INTEGER,
            label_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_production_status
            ON production(status, created_at);

        CREATE TABLE IF NOT EXISTS production_history (
            id TEXT PRIMARY KEY,
            production_id TEXT NOT NULL REFERENCES production(id) ON DELETE CASCADE,
            from_status TEXT,
            to_status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            note TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_production_history_production
            ON production_history(production_id, created_at);

        CREATE TABLE IF NOT EXISTS movement (
            id TEXT PRIMARY KEY,
            movement_type TEXT NOT NULL CHECK (movement_type IN (
                'EMPTY_CANS_ADD', 'EMPTY_CANS_CONS', 'EMPTY_CANS_SCRAP',
                'LABEL_ADD', 'LABEL_CONS',
                'PROD_FINAL_IN', 'PROD_FINAL_OUT', 'PROD_SCRAP'
            )),
            reference_id TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            provider TEXT,
            lot TEXT,
            brand_id INTEGER,
            style_id INTEGER,
            label_name TEXT,
            production_status TEXT,
            detail TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_movement_type_ts
            ON movement(movement_type, created_at);
        CREATE INDEX IF NOT EXISTS idx_movement_reference
            ON movement(reference_id);

        CREATE TRIGGER IF NOT EXISTS trg_movement_no_update
            BEFORE UPDATE ON movement
            BEGIN SELECT RAISE(ABORT, 'movement ledger is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS trg_movement_no_delete
            BEFORE DELETE ON movement
            BEGIN SELECT RAISE(ABORT, 'movement ledger is append-only'); END;

        CREATE TABLE IF NOT EXISTS delivery_record (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            client TEXT,
            item_code TEXT NOT NULL,
            brand_id INTEGER NOT NULL,
            style_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            operator TEXT NOT NULL,
            delivered_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_delivery_record_order
            ON delivery_record(order_id);

        CREATE TRIGGER IF NOT EXISTS trg_delivery_record_no_update
            BEFORE UPDATE ON delivery_record
            BEGIN SELECT RAISE(ABORT, 'delivery records are create-only'); END;
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 时间戳 → 存储文本
pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 存储文本 → 时间戳（列序号用于错误定位）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_PARSE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
