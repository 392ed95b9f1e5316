// ==========================================
// 精酿啤酒灌装台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化
// 约定: 结构体方法自行加锁, `*_tx` 关联函数在调用方事务内执行
// ==========================================

pub mod delivery_repo;
pub mod empty_can_repo;
pub mod error;
pub mod label_repo;
pub mod movement_repo;
pub mod production_repo;
pub mod store;

// 重导出核心仓储
pub use delivery_repo::DeliveryRecordRepository;
pub use empty_can_repo::EmptyCanBatchRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use label_repo::LabelBatchRepository;
pub use movement_repo::{MovementRepository, MovementSumFilter};
pub use production_repo::{InProcessFilter, ProductionRepository};
pub use store::LedgerStore;
