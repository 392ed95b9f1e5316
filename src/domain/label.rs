// ==========================================
// 精酿啤酒灌装台账系统 - 标签领域模型
// ==========================================
// 标签身份是分配键: 目录标签按 (品牌, 款式), 自定义标签按名称
// 同一身份的标签批次合并为一个库存池
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 标签身份前缀（同时用作台账 reference_id）
pub const LABEL_KEY_PREFIX: &str = "label:";

// ==========================================
// LabelIdentity - 标签身份
// ==========================================
// 封闭变体: Catalog 只按 brand/style 匹配, Custom 只按 name 匹配
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelIdentity {
    Catalog { brand_id: i64, style_id: i64 },
    Custom { name: String },
}

impl LabelIdentity {
    pub fn catalog(brand_id: i64, style_id: i64) -> Self {
        LabelIdentity::Catalog { brand_id, style_id }
    }

    /// 自定义标签, 名称去除首尾空白
    pub fn custom(name: &str) -> Self {
        LabelIdentity::Custom {
            name: name.trim().to_string(),
        }
    }

    /// 从调用方的松散选择解析身份
    ///
    /// - 非空 name 优先, 解析为 Custom（此时 brand/style 被忽略）
    /// - 否则 brand 与 style 同时存在时解析为 Catalog
    /// - 其余情况返回 None（未选择标签）
    pub fn from_selection(
        brand_id: Option<i64>,
        style_id: Option<i64>,
        name: Option<&str>,
    ) -> Option<Self> {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            return Some(Self::custom(name));
        }
        match (brand_id, style_id) {
            (Some(brand_id), Some(style_id)) => Some(Self::catalog(brand_id, style_id)),
            _ => None,
        }
    }

    /// 台账 reference_id
    pub fn key(&self) -> String {
        match self {
            LabelIdentity::Catalog { brand_id, style_id } => {
                format!("{}catalog:{}:{}", LABEL_KEY_PREFIX, brand_id, style_id)
            }
            LabelIdentity::Custom { name } => format!("{}custom:{}", LABEL_KEY_PREFIX, name),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, LabelIdentity::Custom { .. })
    }

    /// 拆分为存储列 (brand_id, style_id, label_name)
    pub fn to_columns(&self) -> (Option<i64>, Option<i64>, Option<String>) {
        match self {
            LabelIdentity::Catalog { brand_id, style_id } => {
                (Some(*brand_id), Some(*style_id), None)
            }
            LabelIdentity::Custom { name } => (None, None, Some(name.clone())),
        }
    }

    /// 从存储列还原
    pub fn from_columns(
        is_custom: bool,
        brand_id: Option<i64>,
        style_id: Option<i64>,
        name: Option<String>,
    ) -> Option<Self> {
        if is_custom {
            name.filter(|n| !n.trim().is_empty())
                .map(|n| Self::custom(&n))
        } else {
            match (brand_id, style_id) {
                (Some(b), Some(s)) => Some(Self::catalog(b, s)),
                _ => None,
            }
        }
    }
}

impl fmt::Display for LabelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelIdentity::Catalog { brand_id, style_id } => {
                write!(f, "brand={} style={}", brand_id, style_id)
            }
            LabelIdentity::Custom { name } => write!(f, "custom='{}'", name),
        }
    }
}

// ==========================================
// LabelBatch - 标签入库批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelBatch {
    pub id: String,
    pub identity: LabelIdentity,
    pub quantity: i64,
    pub provider: Option<String>,
    pub lot: Option<String>,
    pub received_at: NaiveDateTime,
}
