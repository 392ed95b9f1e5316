// ==========================================
// 精酿啤酒灌装台账系统 - 引擎层
// ==========================================
// 职责: 实现状态机、库存派生、合并与 FIFO 分配规则
// 红线: Engine 不拼 SQL, 数据访问全部经由仓储层
// 约定: 每个写操作是一个 IMMEDIATE 事务, 提交后经 CommitNotifier 通知
// ==========================================

pub mod delivery;
pub mod error;
pub mod events;
pub mod ids;
pub mod intake;
pub mod label_index;
pub mod merge;
pub mod production;
pub mod stock;

// 重导出核心引擎
pub use delivery::{DeliveryCoordinator, DeliveryOrder, DeliveryOutcome};
pub use error::{EngineError, EngineResult};
pub use events::{
    CommitNotifier, LedgerEvent, LedgerEventPublisher, LedgerEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use ids::{IdGenerator, UuidIdGenerator};
pub use intake::{InventoryIntake, SupplySource};
pub use label_index::LabelAllocationIndex;
pub use merge::{plan_fifo, FinalizeOutcome, FinishedGoodsMerger, LotDraw};
pub use production::{
    validate_transition, AdvanceOutcome, ProductionStateMachine, ScrapOutcome, TransitionPlan,
};
pub use stock::{
    IntegrityCheck, IntegrityIssue, IntegrityReport, StockAggregator, StockFilter, StockSummary,
};
