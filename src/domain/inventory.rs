// ==========================================
// 精酿啤酒灌装台账系统 - 空罐库存领域模型
// ==========================================
// 入库批次行创建后不可修改
// 领用/报废只通过台账流水减少派生净额
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 空罐入库批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyCanBatch {
    pub id: String,
    pub quantity: i64,
    pub provider: Option<String>,
    pub lot: Option<String>,
    pub received_at: NaiveDateTime,
}
