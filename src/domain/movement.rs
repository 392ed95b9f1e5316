// ==========================================
// 精酿啤酒灌装台账系统 - 台账流水领域模型
// ==========================================
// 红线: 流水只追加, 不修改不删除
// 更正通过追加补偿流水（如报废）完成
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::production::FinishedKey;
use crate::domain::types::{MovementType, ProductionStatus};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 空罐池报废流水的 reference_id（不关联生产批次）
pub const EMPTY_POOL_REF: &str = "EMPTY_POOL";

// ==========================================
// MovementEntry - 台账流水
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: String,
    pub movement_type: MovementType,
    pub reference_id: String, // 弱引用, 不级联
    pub quantity: i64,        // 恒为正数
    pub provider: Option<String>,
    pub lot: Option<String>,

    // ===== 池键维度 =====
    pub brand_id: Option<i64>,
    pub style_id: Option<i64>,
    pub label_name: Option<String>,
    pub production_status: Option<ProductionStatus>, // 追加时被引用批次的状态

    pub detail: Option<String>,
    pub created_at: NaiveDateTime,
}

impl MovementEntry {
    /// 创建新的流水（时间戳取当前 UTC）
    pub fn new(
        id: String,
        movement_type: MovementType,
        reference_id: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            id,
            movement_type,
            reference_id: reference_id.into(),
            quantity,
            provider: None,
            lot: None,
            brand_id: None,
            style_id: None,
            label_name: None,
            production_status: None,
            detail: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn with_source(mut self, provider: Option<String>, lot: Option<String>) -> Self {
        self.provider = provider;
        self.lot = lot;
        self
    }

    /// 按标签身份写入池键
    pub fn with_label(mut self, identity: &LabelIdentity) -> Self {
        let (brand_id, style_id, name) = identity.to_columns();
        self.brand_id = brand_id;
        self.style_id = style_id;
        self.label_name = name;
        self
    }

    /// 按成品池键写入
    pub fn with_key(mut self, key: FinishedKey) -> Self {
        self.brand_id = Some(key.brand_id);
        self.style_id = Some(key.style_id);
        self
    }

    pub fn with_status(mut self, status: ProductionStatus) -> Self {
        self.production_status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// MovementFilter - 流水查询条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub reference_id_prefix: Option<String>,
    pub from: Option<NaiveDateTime>, // 含
    pub to: Option<NaiveDateTime>,   // 含
}

// ==========================================
// 分页
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32, // 从 1 开始
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// SQL OFFSET
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementPage {
    pub items: Vec<MovementEntry>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
