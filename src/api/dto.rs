// ==========================================
// 精酿啤酒灌装台账系统 - API 请求/响应 DTO
// ==========================================
// 状态/类型/库存池字段以字符串传入, 由 API 层解析并校验
// ==========================================

use crate::domain::delivery::{DeliveryRecord, DeliveryRequestLine, LotConsumption};
use crate::domain::label::LabelIdentity;
use crate::domain::types::ProductionStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// 生产批次
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductionRequest {
    pub brand_id: i64,
    pub style_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProductionResponse {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvanceProductionRequest {
    pub production_id: String,
    pub target_status: String,
    pub label_brand_id: Option<i64>,
    pub label_style_id: Option<i64>,
    pub label_name: Option<String>,
}

impl AdvanceProductionRequest {
    /// 调用方的标签选择（空白名称视为未填写）
    pub fn label_selection(&self) -> Option<LabelIdentity> {
        LabelIdentity::from_selection(
            self.label_brand_id,
            self.label_style_id,
            self.label_name.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceProductionResponse {
    pub id: String,
    pub status: ProductionStatus,
    /// 合并后保留的批次 ID
    pub merged_into: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapProductionResponse {
    pub id: String,
    pub new_qty: i64,
}

// ==========================================
// 入库
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveLabelsRequest {
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub label_name: Option<String>,
    pub quantity: i64,
    pub provider: Option<String>,
    pub lot: Option<String>,
}

// ==========================================
// 发货
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillDeliveryRequest {
    pub order_id: String,
    pub client: Option<String>,
    /// 为空时使用配置的默认操作人
    pub operator: Option<String>,
    pub lines: Vec<DeliveryRequestLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillDeliveryResponse {
    pub order_id: String,
    pub consumed: Vec<LotConsumption>,
    pub records: Vec<DeliveryRecord>,
}

// ==========================================
// 查询
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockQuery {
    pub pool: String,
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub label_name: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementQuery {
    pub movement_type: Option<String>,
    pub reference_id_prefix: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    /// 从 1 开始; 缺省为 1
    pub page: Option<u32>,
    /// 缺省取配置默认值, 超过上限取上限
    pub page_size: Option<u32>,
}
