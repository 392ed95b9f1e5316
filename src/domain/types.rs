// ==========================================
// 精酿啤酒灌装台账系统 - 领域类型定义
// ==========================================
// 生产状态 / 台账流水类型 / 库存池
// 序列化格式与数据库存储值一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 生产状态 (Production Status)
// ==========================================
// ENLATADO(初始) → {PAUSTERIZADO, ETIQUETADO} → FINAL(终态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStatus {
    Enlatado,     // 已灌装
    Pausterizado, // 已巴氏杀菌
    Etiquetado,   // 已贴标
    Final,        // 成品
}

impl ProductionStatus {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Enlatado => "ENLATADO",
            ProductionStatus::Pausterizado => "PAUSTERIZADO",
            ProductionStatus::Etiquetado => "ETIQUETADO",
            ProductionStatus::Final => "FINAL",
        }
    }

    /// 从字符串解析（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENLATADO" => Some(ProductionStatus::Enlatado),
            "PAUSTERIZADO" => Some(ProductionStatus::Pausterizado),
            "ETIQUETADO" => Some(ProductionStatus::Etiquetado),
            "FINAL" => Some(ProductionStatus::Final),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductionStatus::Final)
    }

    /// 是否为可进入 FINAL 的前置工序
    pub fn is_finishing_stage(&self) -> bool {
        matches!(
            self,
            ProductionStatus::Pausterizado | ProductionStatus::Etiquetado
        )
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 台账流水类型 (Movement Type)
// ==========================================
// 数量统一存储为正数, 方向由类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    EmptyCansAdd,   // 空罐入库
    EmptyCansCons,  // 空罐领用（创建生产批次）
    EmptyCansScrap, // 空罐报废
    LabelAdd,       // 标签入库
    LabelCons,      // 标签领用（贴标）
    ProdFinalIn,    // 成品入库（批次完结/合并）
    ProdFinalOut,   // 成品出库（发货）
    ProdScrap,      // 生产批次报废
}

impl MovementType {
    pub const ALL: [MovementType; 8] = [
        MovementType::EmptyCansAdd,
        MovementType::EmptyCansCons,
        MovementType::EmptyCansScrap,
        MovementType::LabelAdd,
        MovementType::LabelCons,
        MovementType::ProdFinalIn,
        MovementType::ProdFinalOut,
        MovementType::ProdScrap,
    ];

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::EmptyCansAdd => "EMPTY_CANS_ADD",
            MovementType::EmptyCansCons => "EMPTY_CANS_CONS",
            MovementType::EmptyCansScrap => "EMPTY_CANS_SCRAP",
            MovementType::LabelAdd => "LABEL_ADD",
            MovementType::LabelCons => "LABEL_CONS",
            MovementType::ProdFinalIn => "PROD_FINAL_IN",
            MovementType::ProdFinalOut => "PROD_FINAL_OUT",
            MovementType::ProdScrap => "PROD_SCRAP",
        }
    }

    /// 从字符串解析, 未识别的类型返回 None
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        MovementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// 所属库存池
    pub fn pool(&self) -> StockPool {
        match self {
            MovementType::EmptyCansAdd
            | MovementType::EmptyCansCons
            | MovementType::EmptyCansScrap => StockPool::EmptyCans,
            MovementType::LabelAdd | MovementType::LabelCons => StockPool::Labels,
            MovementType::ProdFinalIn | MovementType::ProdFinalOut | MovementType::ProdScrap => {
                StockPool::FinishedGoods
            }
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 库存池 (Stock Pool)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockPool {
    EmptyCans,     // 空罐
    Labels,        // 标签
    FinishedGoods, // 成品
    InProcess,     // 在制品（未完结批次）
}

impl StockPool {
    pub const ALL: [StockPool; 4] = [
        StockPool::EmptyCans,
        StockPool::Labels,
        StockPool::FinishedGoods,
        StockPool::InProcess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockPool::EmptyCans => "EMPTY_CANS",
            StockPool::Labels => "LABELS",
            StockPool::FinishedGoods => "FINISHED_GOODS",
            StockPool::InProcess => "IN_PROCESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        StockPool::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for StockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
