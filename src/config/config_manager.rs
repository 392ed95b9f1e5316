// ==========================================
// 精酿啤酒灌装台账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 未配置或格式错误时回退默认值, 不报错
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ==========================================
// 默认值
// ==========================================
pub const DEFAULT_STOCK_CACHE_TTL_SECS: u64 = 5;
pub const MIN_STOCK_CACHE_TTL_SECS: u64 = 1;
pub const MAX_STOCK_CACHE_TTL_SECS: u64 = 9;
pub const DEFAULT_MOVEMENT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_MOVEMENT_PAGE_SIZE_MAX: u32 = 500;
pub const DEFAULT_OPERATOR: &str = "system";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(json!(config_map).to_string())
    }

    // ===== 库存缓存 =====

    /// 库存净额缓存 TTL（钳位到 1..=9 秒）
    pub fn stock_cache_ttl(&self) -> RepositoryResult<Duration> {
        let value = self.get_config_or_default(
            config_keys::STOCK_CACHE_TTL_SECS,
            &DEFAULT_STOCK_CACHE_TTL_SECS.to_string(),
        )?;
        let secs = value
            .parse::<u64>()
            .unwrap_or(DEFAULT_STOCK_CACHE_TTL_SECS)
            .clamp(MIN_STOCK_CACHE_TTL_SECS, MAX_STOCK_CACHE_TTL_SECS);
        Ok(Duration::from_secs(secs))
    }

    // ===== 流水分页 =====

    pub fn movement_page_size_default(&self) -> RepositoryResult<u32> {
        let value = self.get_config_or_default(
            config_keys::MOVEMENT_PAGE_SIZE_DEFAULT,
            &DEFAULT_MOVEMENT_PAGE_SIZE.to_string(),
        )?;
        Ok(value
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MOVEMENT_PAGE_SIZE))
    }

    pub fn movement_page_size_max(&self) -> RepositoryResult<u32> {
        let value = self.get_config_or_default(
            config_keys::MOVEMENT_PAGE_SIZE_MAX,
            &DEFAULT_MOVEMENT_PAGE_SIZE_MAX.to_string(),
        )?;
        Ok(value
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MOVEMENT_PAGE_SIZE_MAX))
    }

    /// 请求页大小 → 实际页大小（缺省取默认值, 超过上限取上限）
    pub fn resolve_page_size(&self, requested: Option<u32>) -> RepositoryResult<u32> {
        let max = self.movement_page_size_max()?;
        let size = match requested.filter(|v| *v > 0) {
            Some(v) => v,
            None => self.movement_page_size_default()?,
        };
        Ok(size.min(max))
    }

    // ===== 发货 =====

    /// 未指定操作人时使用的默认操作人
    pub fn default_operator(&self) -> RepositoryResult<String> {
        self.get_config_or_default(config_keys::DEFAULT_OPERATOR, DEFAULT_OPERATOR)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 库存缓存
    pub const STOCK_CACHE_TTL_SECS: &str = "stock_cache_ttl_secs";

    // 流水分页
    pub const MOVEMENT_PAGE_SIZE_DEFAULT: &str = "movement_page_size_default";
    pub const MOVEMENT_PAGE_SIZE_MAX: &str = "movement_page_size_max";

    // 发货
    pub const DEFAULT_OPERATOR: &str = "default_operator";
}
