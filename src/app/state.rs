// ==========================================
// 精酿啤酒灌装台账系统 - 应用状态
// ==========================================
// 职责: 装配共享连接、仓储、引擎与 API 实例
// ==========================================

use std::sync::Arc;

use crate::api::LedgerApi;
use crate::config::config_manager::ConfigManager;
use crate::engine::{
    CommitNotifier, DeliveryCoordinator, IdGenerator, InventoryIntake, LabelAllocationIndex,
    LedgerEventPublisher, OptionalEventPublisher, ProductionStateMachine, StockAggregator,
    UuidIdGenerator,
};
use crate::repository::{
    DeliveryRecordRepository, LedgerStore, MovementRepository, ProductionRepository,
};

/// 应用状态
///
/// 持有唯一的共享连接; 所有引擎与仓储共用该连接, 写事务在连接锁内串行执行
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 台账API
    pub ledger_api: Arc<LedgerApi>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,

    /// 库存聚合器（带短期缓存）
    pub stock: Arc<StockAggregator>,

    pub store: LedgerStore,
}

impl AppState {
    /// 创建新的AppState实例（无外部事件订阅者）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::build(db_path, OptionalEventPublisher::none())
    }

    /// 创建AppState并挂接外部事件订阅者
    pub fn with_publisher(
        db_path: String,
        publisher: Arc<dyn LedgerEventPublisher>,
    ) -> Result<Self, String> {
        Self::build(db_path, OptionalEventPublisher::with_publisher(publisher))
    }

    fn build(db_path: String, publisher: OptionalEventPublisher) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let store = LedgerStore::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = store.connection();

        // ==========================================
        // 配置
        // ==========================================
        let config = Arc::new(ConfigManager::from_connection(conn.clone()));
        let ttl = config
            .stock_cache_ttl()
            .map_err(|e| format!("无法读取库存缓存配置: {}", e))?;
        tracing::debug!(ttl_secs = ttl.as_secs(), "库存缓存 TTL");

        // ==========================================
        // 仓储（只读查询）
        // ==========================================
        let production_repo = Arc::new(ProductionRepository::new(conn.clone()));
        let movement_repo = Arc::new(MovementRepository::new(conn.clone()));
        let delivery_repo = Arc::new(DeliveryRecordRepository::new(conn));

        // ==========================================
        // 引擎
        // ==========================================
        let ids: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
        let stock = Arc::new(StockAggregator::new(store.clone(), ttl));
        let notifier = Arc::new(CommitNotifier::new(stock.clone(), publisher));
        let labels = Arc::new(LabelAllocationIndex::new(store.clone()));
        let state_machine = Arc::new(ProductionStateMachine::new(
            store.clone(),
            ids.clone(),
            notifier.clone(),
        ));
        let delivery = Arc::new(DeliveryCoordinator::new(
            store.clone(),
            ids.clone(),
            stock.clone(),
            notifier.clone(),
        ));
        let intake = Arc::new(InventoryIntake::new(store.clone(), ids, notifier));

        // ==========================================
        // API
        // ==========================================
        let ledger_api = Arc::new(LedgerApi::new(
            production_repo,
            movement_repo,
            delivery_repo,
            config.clone(),
            stock.clone(),
            labels,
            state_machine,
            delivery,
            intake,
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            ledger_api,
            config,
            stock,
            store,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 BREWERY_LEDGER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("BREWERY_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./brewery_ledger.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("brewery-ledger");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("brewery_ledger.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_wires_ledger_api() {
        let temp = NamedTempFile::new().unwrap();
        let state = AppState::new(temp.path().to_string_lossy().to_string()).unwrap();
        let summary = state.ledger_api.stock_summary().unwrap();
        assert_eq!(summary.empty_cans, 0);
        assert_eq!(summary.finished_goods, 0);
    }
}
