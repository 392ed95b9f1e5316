// ==========================================
// 精酿啤酒灌装台账系统 - 生产批次状态机
// ==========================================
// 状态: ENLATADO(初始) → {PAUSTERIZADO, ETIQUETADO} → FINAL(终态)
// 校验顺序: 不存在 → 终态 → 自转换(空操作) → FINAL 前置阶段 → 重复进入 → 未选标签 → 标签不足
// 每次转换写一条历史; 实体变更 + 历史 + 流水在同一事务内完成
// 可用量在事务内实时计算, 不读缓存
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::movement::{MovementEntry, EMPTY_POOL_REF};
use crate::domain::production::{Production, ProductionHistoryEntry};
use crate::domain::types::{MovementType, ProductionStatus, StockPool};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{CommitNotifier, LedgerEvent, LedgerEventType};
use crate::engine::ids::IdGenerator;
use crate::engine::label_index::LabelAllocationIndex;
use crate::engine::merge::FinishedGoodsMerger;
use crate::engine::stock::{StockAggregator, StockFilter};
use crate::repository::{LedgerStore, MovementRepository, ProductionRepository};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// ==========================================
// 转换校验（纯函数）
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// 目标即当前状态: 成功但不写历史/流水
    NoOp,
    Apply,
}

/// 校验状态转换
///
/// # 参数
/// - `visited`: 历史中出现过的目标状态
pub fn validate_transition(
    production_id: &str,
    current: ProductionStatus,
    target: ProductionStatus,
    visited: &[ProductionStatus],
) -> EngineResult<TransitionPlan> {
    if current.is_terminal() {
        return Err(EngineError::TerminalState {
            production_id: production_id.to_string(),
        });
    }
    if current == target {
        return Ok(TransitionPlan::NoOp);
    }
    if target.is_terminal() && !current.is_finishing_stage() {
        return Err(EngineError::FinalRequiresPriorStage { from: current });
    }
    // ENLATADO 是初始状态, 恒视为已到达
    if target == ProductionStatus::Enlatado || visited.contains(&target) {
        return Err(EngineError::RevisitNotAllowed {
            from: current,
            to: target,
        });
    }
    Ok(TransitionPlan::Apply)
}

// ==========================================
// 结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub id: String,
    pub status: ProductionStatus,
    /// 自转换时为 false
    pub changed: bool,
    /// 进入 FINAL 并入其他批次时为目标批次 ID
    pub merged_into: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapOutcome {
    pub id: String,
    pub new_quantity: i64,
}

// ==========================================
// ProductionStateMachine
// ==========================================

pub struct ProductionStateMachine {
    store: LedgerStore,
    ids: Arc<dyn IdGenerator>,
    notifier: Arc<CommitNotifier>,
}

impl ProductionStateMachine {
    pub fn new(store: LedgerStore, ids: Arc<dyn IdGenerator>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            store,
            ids,
            notifier,
        }
    }

    /// 创建生产批次（领用空罐）
    ///
    /// # 返回
    /// - `Err(InsufficientEmptyCans)`: 空罐净额小于数量
    pub fn create_production(&self, brand_id: i64, style_id: i64, quantity: i64) -> EngineResult<Production> {
        EngineError::require_positive("quantity", quantity)?;
        let ids = self.ids.as_ref();

        let production = self.store.in_transaction(|tx| -> EngineResult<Production> {
            let available = empty_can_net_tx(tx)?;
            if available < quantity {
                return Err(EngineError::InsufficientEmptyCans {
                    available,
                    needed: quantity,
                });
            }

            let now = Utc::now().naive_utc();
            let production = Production::new(ids.next_id(), brand_id, style_id, quantity, now);
            ProductionRepository::insert_tx(tx, &production)?;
            ProductionRepository::insert_history_tx(
                tx,
                &ProductionHistoryEntry {
                    id: ids.next_id(),
                    production_id: production.id.clone(),
                    from_status: None,
                    to_status: ProductionStatus::Enlatado,
                    created_at: now,
                    note: None,
                },
            )?;
            MovementRepository::append_tx(
                tx,
                &MovementEntry::new(ids.next_id(), MovementType::EmptyCansCons, production.id.as_str(), quantity)
                    .with_key(production.effective_key())
                    .with_status(ProductionStatus::Enlatado),
            )?;
            Ok(production)
        })?;

        info!(
            production_id = %production.id,
            brand_id,
            style_id,
            quantity,
            "生产批次已创建"
        );
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::ProductionCreated,
            production.id.as_str(),
            quantity,
            vec![StockPool::EmptyCans, StockPool::InProcess],
        ));
        Ok(production)
    }

    /// 推进批次状态
    ///
    /// # 参数
    /// - `label`: 进入 ETIQUETADO 时必须提供
    pub fn advance(
        &self,
        production_id: &str,
        target: ProductionStatus,
        label: Option<LabelIdentity>,
    ) -> EngineResult<AdvanceOutcome> {
        let ids = self.ids.as_ref();

        let (outcome, quantity) = self.store.in_transaction(|tx| -> EngineResult<_> {
            let mut production = ProductionRepository::find_by_id_tx(tx, production_id)?
                .ok_or_else(|| EngineError::ProductionNotFound(production_id.to_string()))?;
            let visited = ProductionRepository::visited_statuses_tx(tx, production_id)?;
            let from = production.status;

            if validate_transition(production_id, from, target, &visited)? == TransitionPlan::NoOp {
                return Ok((
                    AdvanceOutcome {
                        id: production.id,
                        status: from,
                        changed: false,
                        merged_into: None,
                    },
                    0,
                ));
            }

            let now = Utc::now().naive_utc();
            let quantity = production.quantity;

            if target == ProductionStatus::Final {
                let finalized = FinishedGoodsMerger::finalize_tx(tx, ids, production, now)?;
                let merged_into = finalized.merged.then(|| finalized.surviving_id.clone());
                return Ok((
                    AdvanceOutcome {
                        id: production_id.to_string(),
                        status: ProductionStatus::Final,
                        changed: true,
                        merged_into,
                    },
                    quantity,
                ));
            }

            if target == ProductionStatus::Etiquetado {
                let identity = label.as_ref().ok_or(EngineError::MissingLabelSelection)?;
                LabelAllocationIndex::reserve_tx(tx, ids, identity, quantity, production_id)?;
                production.stamp_label(identity);
            }

            production.status = target;
            production.updated_at = now;
            ProductionRepository::update_tx(tx, &production)?;
            ProductionRepository::insert_history_tx(
                tx,
                &ProductionHistoryEntry {
                    id: ids.next_id(),
                    production_id: production.id.clone(),
                    from_status: Some(from),
                    to_status: target,
                    created_at: now,
                    note: production
                        .label_identity()
                        .filter(|_| target == ProductionStatus::Etiquetado)
                        .map(|identity| format!("label {}", identity)),
                },
            )?;

            Ok((
                AdvanceOutcome {
                    id: production.id,
                    status: target,
                    changed: true,
                    merged_into: None,
                },
                quantity,
            ))
        })?;

        if !outcome.changed {
            tracing::debug!(production_id, status = %outcome.status, "自转换, 无变更");
            return Ok(outcome);
        }

        info!(
            production_id,
            status = %outcome.status,
            merged_into = ?outcome.merged_into,
            "批次状态已推进"
        );

        let (event_type, pools) = match (target, &outcome.merged_into) {
            (ProductionStatus::Final, Some(_)) => (
                LedgerEventType::ProductionMerged,
                vec![StockPool::InProcess, StockPool::FinishedGoods],
            ),
            (ProductionStatus::Final, None) => (
                LedgerEventType::ProductionFinalized,
                vec![StockPool::InProcess, StockPool::FinishedGoods],
            ),
            (ProductionStatus::Etiquetado, _) => (
                LedgerEventType::ProductionAdvanced,
                vec![StockPool::Labels],
            ),
            _ => (LedgerEventType::ProductionAdvanced, Vec::new()),
        };
        self.notifier
            .committed(LedgerEvent::new(event_type, production_id, quantity, pools));
        Ok(outcome)
    }

    /// 报废批次部分数量（不改变状态）
    ///
    /// # 返回
    /// - `Err(OverScrap)`: 报废数量超过当前数量
    pub fn scrap(&self, production_id: &str, quantity: i64) -> EngineResult<ScrapOutcome> {
        EngineError::require_positive("quantity", quantity)?;
        let ids = self.ids.as_ref();

        let (outcome, status) = self.store.in_transaction(|tx| -> EngineResult<_> {
            let mut production = ProductionRepository::find_by_id_tx(tx, production_id)?
                .ok_or_else(|| EngineError::ProductionNotFound(production_id.to_string()))?;
            if quantity > production.quantity {
                return Err(EngineError::OverScrap {
                    production_id: production_id.to_string(),
                    available: production.quantity,
                    requested: quantity,
                });
            }

            let now = Utc::now().naive_utc();
            production.quantity -= quantity;
            production.updated_at = now;
            ProductionRepository::update_tx(tx, &production)?;

            MovementRepository::append_tx(
                tx,
                &MovementEntry::new(ids.next_id(), MovementType::ProdScrap, production_id, quantity)
                    .with_key(production.effective_key())
                    .with_status(production.status),
            )?;
            ProductionRepository::insert_history_tx(
                tx,
                &ProductionHistoryEntry {
                    id: ids.next_id(),
                    production_id: production_id.to_string(),
                    from_status: Some(production.status),
                    to_status: production.status,
                    created_at: now,
                    note: Some(format!(
                        "报废 {} 件, 剩余 {}",
                        quantity, production.quantity
                    )),
                },
            )?;

            Ok((
                ScrapOutcome {
                    id: production.id,
                    new_quantity: production.quantity,
                },
                production.status,
            ))
        })?;

        info!(
            production_id,
            quantity,
            remaining = outcome.new_quantity,
            status = %status,
            "批次报废已记录"
        );
        let pool = if status.is_terminal() {
            StockPool::FinishedGoods
        } else {
            StockPool::InProcess
        };
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::ProductionScrapped,
            production_id,
            quantity,
            vec![pool],
        ));
        Ok(outcome)
    }

    /// 报废空罐（不关联批次）
    ///
    /// # 返回
    /// - `Err(InsufficientEmptyCans)`: 报废数量超过空罐净额
    pub fn scrap_empty_cans(&self, quantity: i64, detail: Option<String>) -> EngineResult<MovementEntry> {
        EngineError::require_positive("quantity", quantity)?;
        let ids = self.ids.as_ref();

        let entry = self.store.in_transaction(|tx| -> EngineResult<MovementEntry> {
            let available = empty_can_net_tx(tx)?;
            if available < quantity {
                return Err(EngineError::InsufficientEmptyCans {
                    available,
                    needed: quantity,
                });
            }
            let mut entry = MovementEntry::new(ids.next_id(), MovementType::EmptyCansScrap, EMPTY_POOL_REF, quantity);
            entry.detail = detail;
            MovementRepository::append_tx(tx, &entry)?;
            Ok(entry)
        })?;

        info!(quantity, movement_id = %entry.id, "空罐报废已记录");
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::EmptyCansScrapped,
            EMPTY_POOL_REF,
            quantity,
            vec![StockPool::EmptyCans],
        ));
        Ok(entry)
    }
}

fn empty_can_net_tx(conn: &Connection) -> EngineResult<i64> {
    Ok(StockAggregator::net_quantity_tx(
        conn,
        StockPool::EmptyCans,
        &StockFilter::default(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProductionStatus::*;

    #[test]
    fn test_validate_terminal_first() {
        let err = validate_transition("P1", Final, Final, &[Enlatado, Final]).unwrap_err();
        assert!(matches!(err, EngineError::TerminalState { .. }));
        let err = validate_transition("P1", Final, Etiquetado, &[]).unwrap_err();
        assert!(matches!(err, EngineError::TerminalState { .. }));
    }

    #[test]
    fn test_validate_self_transition_is_noop() {
        assert_eq!(
            validate_transition("P1", Pausterizado, Pausterizado, &[Enlatado, Pausterizado]).unwrap(),
            TransitionPlan::NoOp
        );
        assert_eq!(
            validate_transition("P1", Enlatado, Enlatado, &[Enlatado]).unwrap(),
            TransitionPlan::NoOp
        );
    }

    #[test]
    fn test_validate_final_requires_prior_stage() {
        let err = validate_transition("P1", Enlatado, Final, &[Enlatado]).unwrap_err();
        assert!(matches!(err, EngineError::FinalRequiresPriorStage { from: Enlatado }));
        assert_eq!(
            validate_transition("P1", Etiquetado, Final, &[Enlatado, Etiquetado]).unwrap(),
            TransitionPlan::Apply
        );
    }

    #[test]
    fn test_validate_revisit() {
        let err = validate_transition("P1", Etiquetado, Pausterizado, &[Enlatado, Pausterizado, Etiquetado])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::RevisitNotAllowed { from: Etiquetado, to: Pausterizado }
        ));
        let err = validate_transition("P1", Pausterizado, Enlatado, &[]).unwrap_err();
        assert!(matches!(err, EngineError::RevisitNotAllowed { .. }));
    }

    #[test]
    fn test_validate_both_finishing_stages_allowed() {
        assert_eq!(
            validate_transition("P1", Pausterizado, Etiquetado, &[Enlatado, Pausterizado]).unwrap(),
            TransitionPlan::Apply
        );
        assert_eq!(
            validate_transition("P1", Etiquetado, Pausterizado, &[Enlatado, Etiquetado]).unwrap(),
            TransitionPlan::Apply
        );
    }
}
