// ==========================================
// 台账事件测试
// ==========================================
// 职责: 验证提交后事件发布, 失败的操作不发布事件
// ==========================================


#[cfg(test)]
mod ledger_events_test {
    use brewery_ledger::app::AppState;
    use brewery_ledger::domain::{ProductionStatus, StockPool};
    use brewery_ledger::engine::{LedgerEvent, LedgerEventPublisher, LedgerEventType};
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    use crate::test_helpers::{advance_to, create_production, create_test_db};

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<LedgerEvent>>,
    }

    impl RecordingPublisher {
        fn types(&self) -> Vec<LedgerEventType> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type)
                .collect()
        }
    }

    impl LedgerEventPublisher for RecordingPublisher {
        fn publish(&self, event: &LedgerEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn test_events_follow_committed_operations() {
        let (_temp, db_path) = create_test_db().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let state = AppState::with_publisher(db_path, publisher.clone()).unwrap();
        let api = &state.ledger_api;

        api.receive_empty_cans(10, None, None).unwrap();
        let id = create_production(api, 1, 1, 4).unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();

        // 失败与无变更的操作不发布
        assert!(create_production(api, 1, 1, 100).is_err());
        let other = create_production(api, 2, 2, 1).unwrap();
        api.advance_production(&advance_to(&other, ProductionStatus::Enlatado))
            .unwrap();

        assert_eq!(
            publisher.types(),
            vec![
                LedgerEventType::EmptyCansReceived,
                LedgerEventType::ProductionCreated,
                LedgerEventType::ProductionAdvanced,
                LedgerEventType::ProductionFinalized,
                LedgerEventType::ProductionCreated,
            ]
        );

        let events = publisher.events.lock().unwrap();
        let finalized = &events[3];
        assert_eq!(finalized.reference_id, id);
        assert_eq!(finalized.quantity, 4);
        assert!(finalized.affected_pools.contains(&StockPool::FinishedGoods));
    }
}
