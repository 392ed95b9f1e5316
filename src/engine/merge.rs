// ==========================================
// 精酿啤酒灌装台账系统 - 成品合并 / FIFO 分配
// ==========================================
// 每个成品键 (有效品牌, 有效款式) 是一个累加器:
// - 批次进入 FINAL 时并入同键最早的 FINAL 批次, 源批次删除
// - 无同键批次时就地转为 FINAL
// 发货出库按创建顺序逐批扣减 (FIFO)
// ==========================================

use crate::domain::movement::MovementEntry;
use crate::domain::production::{Production, ProductionHistoryEntry};
use crate::domain::types::{MovementType, ProductionStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::ids::IdGenerator;
use crate::repository::{MovementRepository, ProductionRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

/// FINAL 处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    /// 保留下来的批次（合并目标或自身）
    pub surviving_id: String,
    /// 是否并入了已有批次
    pub merged: bool,
    /// 保留批次合并后的数量
    pub quantity: i64,
}

/// FIFO 单批次扣减计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub production_id: String,
    pub take: i64,
    pub remaining: i64,
}

/// 按顺序从各批次扣减 `needed`
///
/// `lots` 为 (批次ID, 当前数量), 已按创建时间正序排列
///
/// # 返回
/// - `Ok(draws)`: 每个被扣减批次一项（跳过数量为 0 的批次）
/// - `Err(available)`: 总量不足, 返回可用总量
pub fn plan_fifo(lots: &[(String, i64)], needed: i64) -> Result<Vec<LotDraw>, i64> {
    let available = lots
        .iter()
        .fold(0i64, |acc, (_, qty)| acc.saturating_add((*qty).max(0)));
    if available < needed {
        return Err(available);
    }

    let mut still_needed = needed;
    let mut draws = Vec::new();
    for (id, qty) in lots {
        if still_needed == 0 {
            break;
        }
        let qty = (*qty).max(0);
        if qty == 0 {
            continue;
        }
        let take = qty.min(still_needed);
        still_needed -= take;
        draws.push(LotDraw {
            production_id: id.clone(),
            take,
            remaining: qty - take,
        });
    }
    Ok(draws)
}

pub struct FinishedGoodsMerger;

impl FinishedGoodsMerger {
    /// 事务内完成进入 FINAL 的全部写入
    ///
    /// # 参数
    /// - `production`: 进入 FINAL 前的批次（status 仍为 PAUSTERIZADO / ETIQUETADO）
    ///
    /// # 说明
    /// - 合并: 目标数量累加, 目标追加一条合并说明历史, 源批次删除（历史级联删除）
    /// - 就地: 状态改为 FINAL, 写一条转换历史
    /// - 数量为 0 时不追加 PROD_FINAL_IN
    pub fn finalize_tx(
        conn: &Connection,
        ids: &dyn IdGenerator,
        mut production: Production,
        now: NaiveDateTime,
    ) -> EngineResult<FinalizeOutcome> {
        let key = production.effective_key();
        let from = production.status;

        let target = ProductionRepository::list_final_by_key_tx(conn, key)?
            .into_iter()
            .find(|p| p.id != production.id);

        let final_in = |reference: &str, detail: String| {
            MovementEntry::new(ids.next_id(), MovementType::ProdFinalIn, reference, production.quantity)
                .with_key(key)
                .with_status(ProductionStatus::Final)
                .with_detail(detail)
        };

        match target {
            Some(mut target) => {
                target.quantity = target
                    .quantity
                    .checked_add(production.quantity)
                    .ok_or_else(|| {
                        EngineError::InvalidInput(format!(
                            "成品批次 {} 合并后数量溢出",
                            target.id
                        ))
                    })?;
                target.updated_at = now;
                ProductionRepository::update_tx(conn, &target)?;

                if production.quantity > 0 {
                    MovementRepository::append_tx(
                        conn,
                        &final_in(&production.id, format!("merged into {}", target.id)),
                    )?;
                }

                ProductionRepository::insert_history_tx(
                    conn,
                    &ProductionHistoryEntry {
                        id: ids.next_id(),
                        production_id: target.id.clone(),
                        from_status: Some(ProductionStatus::Final),
                        to_status: ProductionStatus::Final,
                        created_at: now,
                        note: Some(format!(
                            "合并批次 {} (from {}), 数量 +{}, 合计 {}",
                            production.id, from, production.quantity, target.quantity
                        )),
                    },
                )?;

                ProductionRepository::delete_tx(conn, &production.id)?;

                info!(
                    source_id = %production.id,
                    target_id = %target.id,
                    key = %key,
                    quantity = production.quantity,
                    total = target.quantity,
                    "批次已并入成品库存"
                );

                Ok(FinalizeOutcome {
                    surviving_id: target.id,
                    merged: true,
                    quantity: target.quantity,
                })
            }
            None => {
                if production.quantity > 0 {
                    MovementRepository::append_tx(
                        conn,
                        &final_in(&production.id, "finalized in place".to_string()),
                    )?;
                }

                production.status = ProductionStatus::Final;
                production.updated_at = now;
                ProductionRepository::update_tx(conn, &production)?;
                ProductionRepository::insert_history_tx(
                    conn,
                    &ProductionHistoryEntry {
                        id: ids.next_id(),
                        production_id: production.id.clone(),
                        from_status: Some(from),
                        to_status: ProductionStatus::Final,
                        created_at: now,
                        note: None,
                    },
                )?;

                info!(
                    production_id = %production.id,
                    key = %key,
                    quantity = production.quantity,
                    "批次就地转为成品"
                );

                Ok(FinalizeOutcome {
                    surviving_id: production.id,
                    merged: false,
                    quantity: production.quantity,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::production::FinishedKey;
    use crate::engine::ids::UuidIdGenerator;
    use crate::repository::LedgerStore;
    use chrono::{Duration, Utc};

    fn lots(raw: &[(&str, i64)]) -> Vec<(String, i64)> {
        raw.iter().map(|(id, q)| (id.to_string(), *q)).collect()
    }

    #[test]
    fn test_plan_fifo_drains_oldest_first() {
        let draws = plan_fifo(&lots(&[("A", 5), ("B", 3)]), 6).unwrap();
        assert_eq!(
            draws,
            vec![
                LotDraw { production_id: "A".into(), take: 5, remaining: 0 },
                LotDraw { production_id: "B".into(), take: 1, remaining: 2 },
            ]
        );
    }

    #[test]
    fn test_plan_fifo_shortfall_reports_available() {
        assert_eq!(plan_fifo(&lots(&[("A", 5), ("B", 3)]), 9), Err(8));
    }

    #[test]
    fn test_plan_fifo_skips_empty_lots() {
        let draws = plan_fifo(&lots(&[("A", 0), ("B", 3)]), 2).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].production_id, "B");
        assert!(plan_fifo(&lots(&[("A", 4)]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_plan_fifo_saturates_huge_lots() {
        let draws = plan_fifo(&lots(&[("A", i64::MAX), ("B", 5)]), i64::MAX).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].remaining, 0);
    }

    fn staged(id: &str, brand: i64, style: i64, qty: i64, at: NaiveDateTime) -> Production {
        let mut p = Production::new(id.to_string(), brand, style, qty, at);
        p.status = ProductionStatus::Pausterizado;
        p
    }

    #[test]
    fn test_finalize_in_place_then_merge() {
        let store = LedgerStore::in_memory().unwrap();
        let t0 = Utc::now().naive_utc();
        let first = staged("P1", 1, 2, 10, t0);
        let second = staged("P2", 1, 2, 4, t0 + Duration::seconds(1));

        let (a, b) = store
            .in_transaction(|tx| -> EngineResult<_> {
                ProductionRepository::insert_tx(tx, &first)?;
                ProductionRepository::insert_tx(tx, &second)?;
                let a = FinishedGoodsMerger::finalize_tx(tx, &UuidIdGenerator, first.clone(), t0)?;
                let b = FinishedGoodsMerger::finalize_tx(tx, &UuidIdGenerator, second.clone(), t0)?;
                Ok((a, b))
            })
            .unwrap();

        assert!(!a.merged);
        assert!(b.merged);
        assert_eq!(b.surviving_id, "P1");
        assert_eq!(b.quantity, 14);

        store
            .read(|conn| {
                let finals = ProductionRepository::list_final_by_key_tx(conn, FinishedKey::new(1, 2))?;
                assert_eq!(finals.len(), 1);
                assert_eq!(finals[0].quantity, 14);
                assert!(ProductionRepository::find_by_id_tx(conn, "P2")?.is_none());
                let ins = MovementRepository::sum_tx(
                    conn,
                    MovementType::ProdFinalIn,
                    &Default::default(),
                )?;
                assert_eq!(ins, 14);
                let history = ProductionRepository::list_history_tx(conn, "P1")?;
                assert_eq!(history.len(), 2);
                assert!(!history[1].is_transition());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_merge_overflow_rolls_back() {
        let store = LedgerStore::in_memory().unwrap();
        let t0 = Utc::now().naive_utc();
        let first = staged("P1", 1, 2, i64::MAX, t0);
        let second = staged("P2", 1, 2, 1, t0 + Duration::seconds(1));
        store
            .in_transaction(|tx| -> EngineResult<_> {
                ProductionRepository::insert_tx(tx, &first)?;
                ProductionRepository::insert_tx(tx, &second)?;
                FinishedGoodsMerger::finalize_tx(tx, &UuidIdGenerator, first.clone(), t0)
            })
            .unwrap();

        let err = store
            .in_transaction(|tx| FinishedGoodsMerger::finalize_tx(tx, &UuidIdGenerator, second.clone(), t0))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        store
            .read(|conn| {
                assert!(ProductionRepository::find_by_id_tx(conn, "P2")?.is_some());
                assert_eq!(
                    ProductionRepository::find_by_id_tx(conn, "P1")?.map(|p| p.quantity),
                    Some(i64::MAX)
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_zero_quantity_finalize_appends_no_movement() {
        let store = LedgerStore::in_memory().unwrap();
        let p = staged("P0", 1, 2, 0, Utc::now().naive_utc());
        store
            .in_transaction(|tx| -> EngineResult<_> {
                ProductionRepository::insert_tx(tx, &p)?;
                FinishedGoodsMerger::finalize_tx(tx, &UuidIdGenerator, p.clone(), p.created_at)
            })
            .unwrap();
        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM movement", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
