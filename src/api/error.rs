// ==========================================
// 精酿啤酒灌装台账系统 - API层错误类型
// ==========================================
// 职责: 将引擎/仓储错误转换为对调用方稳定的错误码与消息
// 约束: 错误消息必须包含显式原因与相关数量
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 库存不足
    // ==========================================
    #[error("空罐库存不足: 可用={available}, 需要={needed}")]
    InsufficientEmptyCans { available: i64, needed: i64 },

    #[error("标签库存不足 ({identity}): 可用={available}, 需要={needed}")]
    InsufficientLabelStock {
        identity: String,
        available: i64,
        needed: i64,
    },

    #[error("成品库存不足 (brand={brand_id}, style={style_id}): 可用={available}, 需要={needed}")]
    InsufficientFinalStock {
        brand_id: i64,
        style_id: i64,
        available: i64,
        needed: i64,
    },

    // ==========================================
    // 状态机
    // ==========================================
    #[error("不可重复进入已到达过的状态: from={from} to={to}")]
    RevisitNotAllowed { from: String, to: String },

    #[error("批次已处于终态: {0}")]
    TerminalState(String),

    #[error("进入 FINAL 前必须经过 PAUSTERIZADO 或 ETIQUETADO: from={from}")]
    FinalRequiresPriorStage { from: String },

    #[error("进入 ETIQUETADO 必须选择标签")]
    MissingLabelSelection,

    #[error("报废数量超过批次数量: production_id={production_id}, 可用={available}, 请求={requested}")]
    OverScrap {
        production_id: String,
        available: i64,
        requested: i64,
    },

    #[error("发货单已存在发货记录: {0}")]
    DuplicateDelivery(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InsufficientEmptyCans { .. } => "INSUFFICIENT_EMPTY_CANS",
            ApiError::InsufficientLabelStock { .. } => "INSUFFICIENT_LABEL_STOCK",
            ApiError::InsufficientFinalStock { .. } => "INSUFFICIENT_FINAL_STOCK",
            ApiError::RevisitNotAllowed { .. } => "REVISIT_NOT_ALLOWED",
            ApiError::TerminalState(_) => "TERMINAL_STATE",
            ApiError::FinalRequiresPriorStage { .. } => "FINAL_REQUIRES_PRIOR_STAGE",
            ApiError::MissingLabelSelection => "MISSING_LABEL_SELECTION",
            ApiError::OverScrap { .. } => "OVER_SCRAP",
            ApiError::DuplicateDelivery(_) => "DUPLICATE_DELIVERY",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 结构化详情（数量/状态）
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::InsufficientEmptyCans { available, needed } => {
                Some(serde_json::json!({ "available": available, "needed": needed }))
            }
            ApiError::InsufficientLabelStock {
                identity,
                available,
                needed,
            } => Some(serde_json::json!({
                "identity": identity,
                "available": available,
                "needed": needed,
            })),
            ApiError::InsufficientFinalStock {
                brand_id,
                style_id,
                available,
                needed,
            } => Some(serde_json::json!({
                "brand_id": brand_id,
                "style_id": style_id,
                "available": available,
                "needed": needed,
            })),
            ApiError::RevisitNotAllowed { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            ApiError::OverScrap {
                production_id,
                available,
                requested,
            } => Some(serde_json::json!({
                "production_id": production_id,
                "available": available,
                "requested": requested,
            })),
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::AppendOnlyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("只追加记录不可修改: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InsufficientEmptyCans { available, needed } => {
                ApiError::InsufficientEmptyCans { available, needed }
            }
            EngineError::InsufficientLabelStock {
                identity,
                available,
                needed,
            } => ApiError::InsufficientLabelStock {
                identity: identity.key(),
                available,
                needed,
            },
            EngineError::InsufficientFinalStock {
                key,
                available,
                needed,
            } => ApiError::InsufficientFinalStock {
                brand_id: key.brand_id,
                style_id: key.style_id,
                available,
                needed,
            },
            EngineError::RevisitNotAllowed { from, to } => ApiError::RevisitNotAllowed {
                from: from.to_string(),
                to: to.to_string(),
            },
            EngineError::TerminalState { production_id } => ApiError::TerminalState(production_id),
            EngineError::FinalRequiresPriorStage { from } => ApiError::FinalRequiresPriorStage {
                from: from.to_string(),
            },
            EngineError::MissingLabelSelection => ApiError::MissingLabelSelection,
            EngineError::OverScrap {
                production_id,
                available,
                requested,
            } => ApiError::OverScrap {
                production_id,
                available,
                requested,
            },
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::ProductionNotFound(id) => {
                ApiError::NotFound(format!("Production(id={})不存在", id))
            }
            EngineError::DuplicateDelivery(order_id) => ApiError::DuplicateDelivery(order_id),
            EngineError::Repository(err) => ApiError::from(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

/// 错误响应（返回给调用方）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}
