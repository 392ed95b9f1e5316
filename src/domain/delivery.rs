// ==========================================
// 精酿啤酒灌装台账系统 - 发货领域模型
// ==========================================
// DeliveryRecord 只创建, 不覆盖
// ==========================================

use crate::domain::production::FinishedKey;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 发货请求行（外部订单的一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequestLine {
    pub item_code: String,
    pub brand_id: i64,
    pub style_id: i64,
    pub quantity: i64,
}

impl DeliveryRequestLine {
    pub fn key(&self) -> FinishedKey {
        FinishedKey::new(self.brand_id, self.style_id)
    }
}

/// 外部订单待发行 + 查询时刻的可用成品数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub item_code: String,
    pub brand_id: i64,
    pub style_id: i64,
    pub pending_qty: i64,
    pub available_qty: i64,
}

impl DeliveryLine {
    pub fn is_fulfillable(&self) -> bool {
        self.available_qty >= self.pending_qty
    }
}

/// 已发货记录（每个发货行一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub order_id: String, // 发货单号 (remito)
    pub client: Option<String>,
    pub item_code: String,
    pub brand_id: i64,
    pub style_id: i64,
    pub quantity: i64,
    pub operator: String,
    pub delivered_at: NaiveDateTime,
}

/// 单个成品批次的出库明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub production_id: String,
    pub brand_id: i64,
    pub style_id: i64,
    pub quantity: i64,
    pub remaining: i64,
}
