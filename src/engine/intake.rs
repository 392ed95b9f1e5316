// ==========================================
// 精酿啤酒灌装台账系统 - 物料入库
// ==========================================
// 入库批次行与对应的 *_ADD 流水在同一事务内写入
// ==========================================

use crate::domain::inventory::EmptyCanBatch;
use crate::domain::label::{LabelBatch, LabelIdentity};
use crate::domain::movement::MovementEntry;
use crate::domain::types::{MovementType, StockPool};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{CommitNotifier, LedgerEvent, LedgerEventType};
use crate::engine::ids::IdGenerator;
use crate::repository::{EmptyCanBatchRepository, LabelBatchRepository, LedgerStore, MovementRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// 供应来源（供应商 / 批号）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplySource {
    pub provider: Option<String>,
    pub lot: Option<String>,
}

impl SupplySource {
    pub fn new(provider: Option<&str>, lot: Option<&str>) -> Self {
        let clean = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        Self {
            provider: clean(provider),
            lot: clean(lot),
        }
    }
}

pub struct InventoryIntake {
    store: LedgerStore,
    ids: Arc<dyn IdGenerator>,
    notifier: Arc<CommitNotifier>,
}

impl InventoryIntake {
    pub fn new(store: LedgerStore, ids: Arc<dyn IdGenerator>, notifier: Arc<CommitNotifier>) -> Self {
        Self {
            store,
            ids,
            notifier,
        }
    }

    /// 空罐入库
    pub fn receive_empty_cans(&self, quantity: i64, source: SupplySource) -> EngineResult<EmptyCanBatch> {
        EngineError::require_positive("quantity", quantity)?;
        let ids = self.ids.as_ref();

        let batch = self.store.in_transaction(|tx| -> EngineResult<EmptyCanBatch> {
            let batch = EmptyCanBatch {
                id: ids.next_id(),
                quantity,
                provider: source.provider.clone(),
                lot: source.lot.clone(),
                received_at: Utc::now().naive_utc(),
            };
            EmptyCanBatchRepository::insert_tx(tx, &batch)?;
            MovementRepository::append_tx(
                tx,
                &MovementEntry::new(ids.next_id(), MovementType::EmptyCansAdd, batch.id.as_str(), quantity)
                    .with_source(batch.provider.clone(), batch.lot.clone()),
            )?;
            Ok(batch)
        })?;

        info!(batch_id = %batch.id, quantity, provider = ?batch.provider, "空罐已入库");
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::EmptyCansReceived,
            batch.id.as_str(),
            quantity,
            vec![StockPool::EmptyCans],
        ));
        Ok(batch)
    }

    /// 标签入库
    pub fn receive_labels(
        &self,
        identity: LabelIdentity,
        quantity: i64,
        source: SupplySource,
    ) -> EngineResult<LabelBatch> {
        EngineError::require_positive("quantity", quantity)?;
        if let LabelIdentity::Custom { name } = &identity {
            if name.trim().is_empty() {
                return Err(EngineError::InvalidInput("自定义标签名称不能为空".to_string()));
            }
        }
        let ids = self.ids.as_ref();

        let batch = self.store.in_transaction(|tx| -> EngineResult<LabelBatch> {
            let batch = LabelBatch {
                id: ids.next_id(),
                identity: identity.clone(),
                quantity,
                provider: source.provider.clone(),
                lot: source.lot.clone(),
                received_at: Utc::now().naive_utc(),
            };
            LabelBatchRepository::insert_tx(tx, &batch)?;
            MovementRepository::append_tx(
                tx,
                &MovementEntry::new(ids.next_id(), MovementType::LabelAdd, identity.key(), quantity)
                    .with_label(&identity)
                    .with_source(batch.provider.clone(), batch.lot.clone())
                    .with_detail(format!("batch={}", batch.id)),
            )?;
            Ok(batch)
        })?;

        info!(batch_id = %batch.id, identity = %batch.identity, quantity, "标签已入库");
        self.notifier.committed(LedgerEvent::new(
            LedgerEventType::LabelsReceived,
            batch.identity.key(),
            quantity,
            vec![StockPool::Labels],
        ));
        Ok(batch)
    }
}
