// ==========================================
// 精酿啤酒灌装台账系统 - 生产批次领域模型
// ==========================================
// Production 是状态机的工作单元
// ProductionHistoryEntry 只追加, 随批次删除级联删除
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::types::ProductionStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FinishedKey - 成品池键 (有效品牌, 有效款式)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FinishedKey {
    pub brand_id: i64,
    pub style_id: i64,
}

impl FinishedKey {
    pub fn new(brand_id: i64, style_id: i64) -> Self {
        Self { brand_id, style_id }
    }
}

impl fmt::Display for FinishedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brand={} style={}", self.brand_id, self.style_id)
    }
}

// ==========================================
// Production - 生产批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub id: String,
    pub brand_id: i64,
    pub style_id: i64,
    pub quantity: i64,
    pub status: ProductionStatus,

    // ===== 有效标签身份 (进入 ETIQUETADO 时写入) =====
    pub label_brand_id: Option<i64>,
    pub label_style_id: Option<i64>,
    pub label_name: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Production {
    /// 新建处于 ENLATADO 的批次
    pub fn new(id: String, brand_id: i64, style_id: i64, quantity: i64, now: NaiveDateTime) -> Self {
        Self {
            id,
            brand_id,
            style_id,
            quantity,
            status: ProductionStatus::Enlatado,
            label_brand_id: None,
            label_style_id: None,
            label_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 成品池键: 已贴目录标签时取标签的品牌/款式, 否则取批次自身
    pub fn effective_key(&self) -> FinishedKey {
        FinishedKey {
            brand_id: self.label_brand_id.unwrap_or(self.brand_id),
            style_id: self.label_style_id.unwrap_or(self.style_id),
        }
    }

    /// 已写入的标签身份
    pub fn label_identity(&self) -> Option<LabelIdentity> {
        LabelIdentity::from_columns(
            self.label_name.is_some(),
            self.label_brand_id,
            self.label_style_id,
            self.label_name.clone(),
        )
    }

    /// 写入有效标签身份（覆盖旧值）
    pub fn stamp_label(&mut self, identity: &LabelIdentity) {
        let (brand_id, style_id, name) = identity.to_columns();
        self.label_brand_id = brand_id;
        self.label_style_id = style_id;
        self.label_name = name;
    }
}

// ==========================================
// ProductionHistoryEntry - 状态历史
// ==========================================
// 报废记录 from == to, 通过 note 说明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionHistoryEntry {
    pub id: String,
    pub production_id: String,
    pub from_status: Option<ProductionStatus>,
    pub to_status: ProductionStatus,
    pub created_at: NaiveDateTime,
    pub note: Option<String>,
}

impl ProductionHistoryEntry {
    /// 是否为状态转换记录（排除报废/合并等注释记录）
    pub fn is_transition(&self) -> bool {
        self.from_status != Some(self.to_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Production {
        Production::new("P1".to_string(), 10, 20, 100, Utc::now().naive_utc())
    }

    #[test]
    fn test_effective_key_defaults_to_own_brand_style() {
        let p = sample();
        assert_eq!(p.effective_key(), FinishedKey::new(10, 20));
        assert!(p.label_identity().is_none());
    }

    #[test]
    fn test_catalog_label_overrides_effective_key() {
        let mut p = sample();
        p.stamp_label(&LabelIdentity::catalog(11, 22));
        assert_eq!(p.effective_key(), FinishedKey::new(11, 22));
        assert_eq!(p.label_identity(), Some(LabelIdentity::catalog(11, 22)));
    }

    #[test]
    fn test_custom_label_keeps_own_key() {
        let mut p = sample();
        p.stamp_label(&LabelIdentity::catalog(11, 22));
        p.stamp_label(&LabelIdentity::custom("Aniversario"));
        assert_eq!(p.effective_key(), FinishedKey::new(10, 20));
        assert_eq!(p.label_identity(), Some(LabelIdentity::custom("Aniversario")));
    }
}
