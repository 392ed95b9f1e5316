// ==========================================
// 精酿啤酒灌装台账系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 空罐/标签/在制/成品四个库存池的只追加台账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{MovementType, ProductionStatus, StockPool};

// 领域实体
pub use domain::{
    DeliveryRecord, EmptyCanBatch, FinishedKey, LabelBatch, LabelIdentity, MovementEntry,
    Production, ProductionHistoryEntry,
};

// 引擎
pub use engine::{
    DeliveryCoordinator, InventoryIntake, LabelAllocationIndex, ProductionStateMachine,
    StockAggregator,
};

// API
pub use api::{ApiError, ApiResult, LedgerApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "精酿啤酒灌装台账系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
