// ==========================================
// 精酿啤酒灌装台账系统 - 台账事件发布
// ==========================================
// 职责: 定义台账事件发布 trait, 事务提交后通知下游
// 说明: 引擎层定义 trait, 订阅方（报表/同步等）实现适配器
// 提交后先失效库存缓存, 再发布事件; 发布失败只记日志
// ==========================================

use crate::domain::types::StockPool;
use crate::engine::stock::StockAggregator;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 台账事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventType {
    EmptyCansReceived,
    EmptyCansScrapped,
    LabelsReceived,
    ProductionCreated,
    ProductionAdvanced,
    ProductionFinalized,
    ProductionMerged,
    ProductionScrapped,
    DeliveryFulfilled,
}

impl LedgerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEventType::EmptyCansReceived => "EmptyCansReceived",
            LedgerEventType::EmptyCansScrapped => "EmptyCansScrapped",
            LedgerEventType::LabelsReceived => "LabelsReceived",
            LedgerEventType::ProductionCreated => "ProductionCreated",
            LedgerEventType::ProductionAdvanced => "ProductionAdvanced",
            LedgerEventType::ProductionFinalized => "ProductionFinalized",
            LedgerEventType::ProductionMerged => "ProductionMerged",
            LedgerEventType::ProductionScrapped => "ProductionScrapped",
            LedgerEventType::DeliveryFulfilled => "DeliveryFulfilled",
        }
    }
}

/// 台账事件
///
/// 一次已提交的变更; `reference_id` 为批次 ID / 发货单号 / 标签身份键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_type: LedgerEventType,
    pub reference_id: String,
    pub quantity: i64,
    /// 受影响的库存池
    pub affected_pools: Vec<StockPool>,
    pub occurred_at: NaiveDateTime,
}

impl LedgerEvent {
    pub fn new(
        event_type: LedgerEventType,
        reference_id: impl Into<String>,
        quantity: i64,
        affected_pools: Vec<StockPool>,
    ) -> Self {
        Self {
            event_type,
            reference_id: reference_id.into(),
            quantity,
            affected_pools,
            occurred_at: Utc::now().naive_utc(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 台账事件发布者 Trait
pub trait LedgerEventPublisher: Send + Sync {
    /// 发布台账事件
    ///
    /// # 返回
    /// - `Err`: 发布失败（不影响已提交的变更）
    fn publish(&self, event: &LedgerEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl LedgerEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: &LedgerEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, reference_id={}",
            event.event_type.as_str(),
            event.reference_id
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn LedgerEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn LedgerEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: &LedgerEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                Ok(())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

// ==========================================
// CommitNotifier - 提交后通知
// ==========================================

/// 事务提交后的统一出口: 失效库存缓存, 发布事件
pub struct CommitNotifier {
    stock: Arc<StockAggregator>,
    publisher: OptionalEventPublisher,
}

impl CommitNotifier {
    pub fn new(stock: Arc<StockAggregator>, publisher: OptionalEventPublisher) -> Self {
        Self { stock, publisher }
    }

    pub fn committed(&self, event: LedgerEvent) {
        self.stock.invalidate();
        if let Err(e) = self.publisher.publish(&event) {
            tracing::warn!(
                event_type = event.event_type.as_str(),
                reference_id = %event.reference_id,
                error = %e,
                "台账事件发布失败（变更已提交）"
            );
        }
    }
}
