// ==========================================
// 精酿啤酒灌装台账系统 - 标签分配索引
// ==========================================
// 目录标签只匹配同 (brand, style) 的目录行
// 自定义标签只按名称匹配
// 预留为全有或全无: 可用量不足时不追加任何流水
// ==========================================

use crate::domain::label::LabelIdentity;
use crate::domain::movement::MovementEntry;
use crate::domain::types::{MovementType, StockPool};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::ids::IdGenerator;
use crate::engine::stock::{StockAggregator, StockFilter};
use crate::repository::{LedgerStore, MovementRepository};
use rusqlite::Connection;

pub struct LabelAllocationIndex {
    store: LedgerStore,
}

impl LabelAllocationIndex {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// 当前可用标签数（实时计算）
    pub fn availability(&self, identity: &LabelIdentity) -> EngineResult<i64> {
        let available = self
            .store
            .read(|conn| Self::availability_tx(conn, identity))?;
        Ok(available)
    }

    pub fn availability_tx(
        conn: &Connection,
        identity: &LabelIdentity,
    ) -> crate::repository::RepositoryResult<i64> {
        StockAggregator::net_quantity_tx(conn, StockPool::Labels, &StockFilter::for_label(identity))
    }

    /// 预留标签: 追加一条 LABEL_CONS
    ///
    /// # 返回
    /// - `Err(InsufficientLabelStock)`: 可用量小于需求, 未追加任何流水
    /// - `Ok(None)`: 需求为 0, 无需追加
    pub fn reserve_tx(
        conn: &Connection,
        ids: &dyn IdGenerator,
        identity: &LabelIdentity,
        quantity: i64,
        production_id: &str,
    ) -> EngineResult<Option<MovementEntry>> {
        if quantity < 0 {
            return Err(EngineError::InvalidInput(format!(
                "标签预留数量不能为负: {}",
                quantity
            )));
        }

        let available = Self::availability_tx(conn, identity)?;
        if available < quantity {
            return Err(EngineError::InsufficientLabelStock {
                identity: identity.clone(),
                available,
                needed: quantity,
            });
        }
        if quantity == 0 {
            return Ok(None);
        }

        let entry = MovementEntry::new(ids.next_id(), MovementType::LabelCons, identity.key(), quantity)
            .with_label(identity)
            .with_detail(format!("production={}", production_id));
        MovementRepository::append_tx(conn, &entry)?;

        tracing::debug!(
            identity = %identity,
            quantity,
            production_id,
            remaining = available - quantity,
            "标签已预留"
        );
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ids::UuidIdGenerator;

    fn add_labels(store: &LedgerStore, identity: &LabelIdentity, qty: i64) {
        let entry = MovementEntry::new(UuidIdGenerator.next_id(), MovementType::LabelAdd, identity.key(), qty)
            .with_label(identity);
        store
            .read(|conn| MovementRepository::append_tx(conn, &entry))
            .unwrap();
    }

    #[test]
    fn test_reserve_then_availability() {
        let store = LedgerStore::in_memory().unwrap();
        let index = LabelAllocationIndex::new(store.clone());
        let identity = LabelIdentity::catalog(1, 2);
        add_labels(&store, &identity, 10);

        let entry = store
            .in_transaction(|tx| {
                LabelAllocationIndex::reserve_tx(tx, &UuidIdGenerator, &identity, 4, "P1")
            })
            .unwrap()
            .unwrap();
        assert_eq!(entry.movement_type, MovementType::LabelCons);
        assert_eq!(entry.reference_id, "label:catalog:1:2");
        assert_eq!(index.availability(&identity).unwrap(), 6);
    }

    #[test]
    fn test_reserve_shortfall_appends_nothing() {
        let store = LedgerStore::in_memory().unwrap();
        let index = LabelAllocationIndex::new(store.clone());
        let identity = LabelIdentity::catalog(1, 2);
        add_labels(&store, &identity, 6);

        let err = store
            .in_transaction(|tx| {
                LabelAllocationIndex::reserve_tx(tx, &UuidIdGenerator, &identity, 7, "P1")
            })
            .unwrap_err();
        match err {
            EngineError::InsufficientLabelStock {
                available, needed, ..
            } => {
                assert_eq!(available, 6);
                assert_eq!(needed, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(index.availability(&identity).unwrap(), 6);
    }

    #[test]
    fn test_custom_and_catalog_pools_are_separate() {
        let store = LedgerStore::in_memory().unwrap();
        let index = LabelAllocationIndex::new(store.clone());
        add_labels(&store, &LabelIdentity::catalog(1, 2), 10);
        add_labels(&store, &LabelIdentity::custom("Aniversario"), 3);

        assert_eq!(index.availability(&LabelIdentity::custom("Aniversario")).unwrap(), 3);
        assert_eq!(index.availability(&LabelIdentity::custom("Otro")).unwrap(), 0);
        assert_eq!(index.availability(&LabelIdentity::catalog(1, 3)).unwrap(), 0);
    }
}
