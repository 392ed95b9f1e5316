// ==========================================
// 精酿啤酒灌装台账系统 - 引擎层错误类型
// ==========================================
// 前置条件失败: 带具体数量/状态的命名错误
// 持久化失败: 原样包装 RepositoryError
// 任一错误都意味着事务已回滚, 实体状态与调用前一致
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::production::FinishedKey;
use crate::domain::types::ProductionStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 库存不足 =====
    #[error("空罐库存不足: available={available}, needed={needed}")]
    InsufficientEmptyCans { available: i64, needed: i64 },

    #[error("标签库存不足 ({identity}): available={available}, needed={needed}")]
    InsufficientLabelStock {
        identity: LabelIdentity,
        available: i64,
        needed: i64,
    },

    #[error("成品库存不足 ({key}): available={available}, needed={needed}")]
    InsufficientFinalStock {
        key: FinishedKey,
        available: i64,
        needed: i64,
    },

    // ===== 状态机 =====
    #[error("不可重复进入已到达过的状态: from={from} to={to}")]
    RevisitNotAllowed {
        from: ProductionStatus,
        to: ProductionStatus,
    },

    #[error("批次已处于终态 FINAL: production_id={production_id}")]
    TerminalState { production_id: String },

    #[error("进入 FINAL 前必须经过 PAUSTERIZADO 或 ETIQUETADO: from={from}")]
    FinalRequiresPriorStage { from: ProductionStatus },

    #[error("进入 ETIQUETADO 必须选择标签")]
    MissingLabelSelection,

    // ===== 数量 / 输入 =====
    #[error("报废数量超过批次数量: production_id={production_id}, available={available}, requested={requested}")]
    OverScrap {
        production_id: String,
        available: i64,
        requested: i64,
    },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("生产批次不存在: {0}")]
    ProductionNotFound(String),

    #[error("发货单已存在发货记录: order_id={0}")]
    DuplicateDelivery(String),

    // ===== 持久化 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// 数量必须为正
    pub fn require_positive(field: &str, value: i64) -> Result<(), EngineError> {
        if value > 0 {
            Ok(())
        } else {
            Err(EngineError::InvalidInput(format!(
                "{} 必须为正数, 实际为 {}",
                field, value
            )))
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
