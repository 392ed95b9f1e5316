// ==========================================
// 精酿啤酒灌装台账系统 - 发货履约协调
// ==========================================
// 整张发货单为一个事务:
// 1. 发货单号已有记录 → DuplicateDelivery
// 2. 按成品键汇总需求, 任一键不足 → InsufficientFinalStock（未做任何写入）
// 3. 逐行按 FIFO 扣减批次, 每个被扣减批次一条 PROD_FINAL_OUT
// 4. 每行一条 DeliveryRecord
// ==========================================

use crate::domain::delivery::{DeliveryLine, DeliveryRecord, DeliveryRequestLine, LotConsumption};
use crate::domain::movement::MovementEntry;
use crate::domain::production::FinishedKey;
use crate::domain::types::{MovementType, ProductionStatus, StockPool};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{CommitNotifier, LedgerEvent, LedgerEventType};
use crate::engine::ids::IdGenerator;
use crate::engine::merge::plan_fifo;
use crate::engine::stock::{StockAggregator, StockFilter};
use crate::repository::{DeliveryRecordRepository, LedgerStore, MovementRepository, ProductionRepository};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 发货请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub order_id: String,
    pub client: Option<String>,
    pub operator: String,
    pub lines: Vec<DeliveryRequestLine>,
}

/// 发货结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub order_id: String,
    pub consumed: Vec<LotConsumption>,
    pub records: Vec<DeliveryRecord>,
}

impl DeliveryOutcome {
    pub fn total_quantity(&self) -> i64 {
        self.records.iter().map(|r| r.quantity).sum()
    }
}

pub struct DeliveryCoordinator {
    store: LedgerStore,
    ids: Arc<dyn IdGenerator>,
    stock: Arc<StockAggregator>,
    notifier: Arc<CommitNotifier>,
}

impl DeliveryCoordinator {
    pub fn new(
        store: LedgerStore,
        ids: Arc<dyn IdGenerator>,
        stock: Arc<StockAggregator>,
        notifier: Arc<CommitNotifier>,
    ) -> Self {
        Self {
            store,
            ids,
            stock,
            notifier,
        }
    }

    /// 履约发货单
    pub fn fulfill(&self, order: &DeliveryOrder) -> EngineResult<DeliveryOutcome> {
        validate_order(order)?;
        let ids = self.ids.as_ref();

        let outcome = self.store.in_transaction(|tx| -> EngineResult<DeliveryOutcome> {
            if DeliveryRecordRepository::exists_for_order_tx(tx, &order.order_id)? {
                return Err(EngineError::DuplicateDelivery(order.order_id.clone()));
            }

            preflight_tx(tx, &order.lines)?;

            let now = Utc::now().naive_utc();
            let mut consumed = Vec::new();
            let mut records = Vec::with_capacity(order.lines.len());

            for line in &order.lines {
                let key = line.key();
                let mut lots: BTreeMap<String, _> = BTreeMap::new();
                let ordered: Vec<(String, i64)> = ProductionRepository::list_final_by_key_tx(tx, key)?
                    .into_iter()
                    .map(|p| {
                        let entry = (p.id.clone(), p.quantity);
                        lots.insert(p.id.clone(), p);
                        entry
                    })
                    .collect();

                let draws = plan_fifo(&ordered, line.quantity).map_err(|available| {
                    EngineError::InsufficientFinalStock {
                        key,
                        available,
                        needed: line.quantity,
                    }
                })?;

                for draw in draws {
                    let Some(mut lot) = lots.remove(&draw.production_id) else {
                        continue;
                    };
                    lot.quantity = draw.remaining;
                    lot.updated_at = now;
                    ProductionRepository::update_tx(tx, &lot)?;
                    MovementRepository::append_tx(
                        tx,
                        &MovementEntry::new(ids.next_id(), MovementType::ProdFinalOut, lot.id.as_str(), draw.take)
                            .with_key(key)
                            .with_status(ProductionStatus::Final)
                            .with_detail(format!("order={} item={}", order.order_id, line.item_code)),
                    )?;
                    consumed.push(LotConsumption {
                        production_id: lot.id,
                        brand_id: key.brand_id,
                        style_id: key.style_id,
                        quantity: draw.take,
                        remaining: draw.remaining,
                    });
                }

                let record = DeliveryRecord {
                    id: ids.next_id(),
                    order_id: order.order_id.clone(),
                    client: order.client.clone(),
                    item_code: line.item_code.clone(),
                    brand_id: line.brand_id,
                    style_id: line.style_id,
                    quantity: line.quantity,
                    operator: order.operator.clone(),
                    delivered_at: now,
                };
                DeliveryRecordRepository::insert_tx(tx, &record)?;
                records.push(record);
            }

            Ok(DeliveryOutcome {
                order_id: order.order_id.clone(),
                consumed,
                records,
            })
        })?;

        info!(
            order_id = %outcome.order_id,
            lines = outcome.records.len(),
            lots_touched = outcome.consumed.len(),
            quantity = outcome.total_quantity(),
            "发货单已履约"
        );
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::DeliveryFulfilled,
            outcome.order_id.as_str(),
            outcome.total_quantity(),
            vec![StockPool::FinishedGoods],
        ));
        Ok(outcome)
    }

    /// 外部订单待发行 + 当前可用成品数（读缓存）
    pub fn pending_lines(&self, lines: &[DeliveryRequestLine]) -> EngineResult<Vec<DeliveryLine>> {
        lines
            .iter()
            .map(|line| {
                let available = self
                    .stock
                    .net_quantity(StockPool::FinishedGoods, &StockFilter::for_key(line.key()))?;
                Ok(DeliveryLine {
                    item_code: line.item_code.clone(),
                    brand_id: line.brand_id,
                    style_id: line.style_id,
                    pending_qty: line.quantity,
                    available_qty: available,
                })
            })
            .collect()
    }
}

fn validate_order(order: &DeliveryOrder) -> EngineResult<()> {
    if order.order_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("发货单号不能为空".to_string()));
    }
    if order.lines.is_empty() {
        return Err(EngineError::InvalidInput("发货单没有明细行".to_string()));
    }
    for line in &order.lines {
        EngineError::require_positive(&format!("lines[{}].quantity", line.item_code), line.quantity)?;
    }
    Ok(())
}

/// 按成品键汇总全部需求后统一校验
fn preflight_tx(conn: &Connection, lines: &[DeliveryRequestLine]) -> EngineResult<()> {
    let mut demand: BTreeMap<FinishedKey, i64> = BTreeMap::new();
    for line in lines {
        let total = demand.entry(line.key()).or_default();
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            EngineError::InvalidInput(format!("成品键 {} 的需求合计溢出", line.key()))
        })?;
    }

    for (key, needed) in demand {
        let available = ProductionRepository::list_final_by_key_tx(conn, key)?
            .iter()
            .fold(0i64, |acc, p| acc.saturating_add(p.quantity.max(0)));
        if available < needed {
            return Err(EngineError::InsufficientFinalStock {
                key,
                available,
                needed,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item: &str, brand: i64, style: i64, qty: i64) -> DeliveryRequestLine {
        DeliveryRequestLine {
            item_code: item.to_string(),
            brand_id: brand,
            style_id: style,
            quantity: qty,
        }
    }

    #[test]
    fn test_validate_order_rejects_blank_and_non_positive() {
        let mut order = DeliveryOrder {
            order_id: "  ".to_string(),
            client: None,
            operator: "ops".to_string(),
            lines: vec![line("A", 1, 1, 1)],
        };
        assert!(matches!(validate_order(&order), Err(EngineError::InvalidInput(_))));

        order.order_id = "R-1".to_string();
        order.lines = vec![line("A", 1, 1, 0)];
        assert!(matches!(validate_order(&order), Err(EngineError::InvalidInput(_))));

        order.lines.clear();
        assert!(matches!(validate_order(&order), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_preflight_sums_demand_per_key() {
        let store = LedgerStore::in_memory().unwrap();
        store
            .read(|conn| {
                let mut p = crate::domain::production::Production::new(
                    "P1".to_string(),
                    1,
                    2,
                    5,
                    Utc::now().naive_utc(),
                );
                p.status = ProductionStatus::Final;
                ProductionRepository::insert_tx(conn, &p)
            })
            .unwrap();

        let single_ok = store.read(|conn| Ok(preflight_tx(conn, &[line("A", 1, 2, 5)]).is_ok()));
        assert!(single_ok.unwrap());

        let err = store
            .read(|conn| Ok(preflight_tx(conn, &[line("A", 1, 2, 3), line("B", 1, 2, 3)])))
            .unwrap()
            .unwrap_err();
        match err {
            EngineError::InsufficientFinalStock { available, needed, .. } => {
                assert_eq!(available, 5);
                assert_eq!(needed, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_preflight_rejects_overflowing_demand() {
        let store = LedgerStore::in_memory().unwrap();
        let err = store
            .read(|conn| Ok(preflight_tx(conn, &[line("A", 1, 2, i64::MAX), line("B", 1, 2, 1)])))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
