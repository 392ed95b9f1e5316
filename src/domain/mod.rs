// ==========================================
// 精酿啤酒灌装台账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod delivery;
pub mod inventory;
pub mod label;
pub mod movement;
pub mod production;
pub mod types;

// 重导出核心类型
pub use delivery::{DeliveryLine, DeliveryRecord, DeliveryRequestLine, LotConsumption};
pub use inventory::EmptyCanBatch;
pub use label::{LabelBatch, LabelIdentity};
pub use movement::{MovementEntry, MovementFilter, MovementPage, PageRequest, EMPTY_POOL_REF};
pub use production::{FinishedKey, Production, ProductionHistoryEntry};
pub use types::{MovementType, ProductionStatus, StockPool};
