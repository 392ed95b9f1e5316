// ==========================================
// 精酿啤酒灌装台账系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供 CLI 或上层界面调用
// ==========================================

pub mod dto;
pub mod error;
pub mod ledger_api;

// 重导出核心类型
pub use dto::{
    AdvanceProductionRequest, AdvanceProductionResponse, CreateProductionRequest,
    CreateProductionResponse, FulfillDeliveryRequest, FulfillDeliveryResponse, MovementQuery,
    ReceiveLabelsRequest, ScrapProductionResponse, StockQuery,
};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use ledger_api::LedgerApi;
