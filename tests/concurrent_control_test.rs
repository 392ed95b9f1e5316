// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证同一数据库文件上的并发写入不会超额领用
// 说明: 每个线程持有独立的 AppState（独立连接）, 依赖 BEGIN IMMEDIATE 串行化
// ==========================================


#[cfg(test)]
mod concurrent_control_test {
    use brewery_ledger::api::{ApiError, FulfillDeliveryRequest, ReceiveLabelsRequest};
    use brewery_ledger::app::AppState;
    use brewery_ledger::domain::{DeliveryRequestLine, FinishedKey, ProductionStatus};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::{
        create_production, create_test_db, label_with_catalog, seed_final_lot, ts,
    };

    const THREADS: usize = 6;

    #[test]
    fn test_concurrent_creates_never_overdraw_empty_cans() {
        let (_temp, db_path) = create_test_db().unwrap();
        let seed = AppState::new(db_path.clone()).unwrap();
        seed.ledger_api.receive_empty_cans(10, None, None).unwrap();

        // 先在主线程建好各自的连接, 避免并发建表
        let states: Vec<AppState> = (0..THREADS)
            .map(|_| AppState::new(db_path.clone()).unwrap())
            .collect();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = states
            .into_iter()
            .map(|state| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    create_production(&state.ledger_api, 1, 1, 4).is_ok()
                })
            })
            .collect();

        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(succeeded, 2);

        let fresh = AppState::new(db_path).unwrap();
        let summary = fresh.ledger_api.stock_summary().unwrap();
        assert_eq!(summary.empty_cans, 2);
        assert_eq!(summary.in_process, 8);
        assert!(fresh.ledger_api.verify_integrity().unwrap().is_clean());
    }

    #[test]
    fn test_concurrent_deliveries_never_overdraw_finished_goods() {
        let (_temp, db_path) = create_test_db().unwrap();
        let key = FinishedKey::new(3, 3);
        let seed = AppState::new(db_path.clone()).unwrap();
        seed_final_lot(&seed, "LOT-1", key, 7, ts("2026-01-01 08:00:00")).unwrap();
        seed_final_lot(&seed, "LOT-2", key, 3, ts("2026-01-02 08:00:00")).unwrap();

        let states: Vec<AppState> = (0..THREADS)
            .map(|_| AppState::new(db_path.clone()).unwrap())
            .collect();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = states
            .into_iter()
            .enumerate()
            .map(|(i, state)| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    state.ledger_api.fulfill_delivery(&FulfillDeliveryRequest {
                        order_id: format!("R-{:04}", i),
                        client: None,
                        operator: Some(format!("worker-{}", i)),
                        lines: vec![DeliveryRequestLine {
                            item_code: "LATA".to_string(),
                            brand_id: key.brand_id,
                            style_id: key.style_id,
                            quantity: 3,
                        }],
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 3);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ApiError::InsufficientFinalStock { .. })));

        let fresh = AppState::new(db_path).unwrap();
        assert_eq!(fresh.ledger_api.stock_summary().unwrap().finished_goods, 1);
        assert!(fresh.ledger_api.verify_integrity().unwrap().is_clean());
    }

    #[test]
    fn test_concurrent_labelling_never_overdraws_labels() {
        let (_temp, db_path) = create_test_db().unwrap();
        let seed = AppState::new(db_path.clone()).unwrap();
        seed.ledger_api.receive_empty_cans(100, None, None).unwrap();
        seed.ledger_api
            .receive_labels(&ReceiveLabelsRequest {
                brand_id: Some(5),
                style_id: Some(5),
                label_name: None,
                quantity: 10,
                provider: None,
                lot: None,
            })
            .unwrap();
        let ids: Vec<String> = (0..THREADS)
            .map(|_| create_production(&seed.ledger_api, 5, 5, 4).unwrap())
            .collect();

        let states: Vec<AppState> = (0..THREADS)
            .map(|_| AppState::new(db_path.clone()).unwrap())
            .collect();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = states
            .into_iter()
            .zip(ids.clone())
            .map(|(state, id)| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let result = state
                        .ledger_api
                        .advance_production(&label_with_catalog(&id, 5, 5));
                    (id, result)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        assert_eq!(succeeded, 2);
        assert!(results
            .iter()
            .filter_map(|(_, r)| r.as_ref().err())
            .all(|e| matches!(e, ApiError::InsufficientLabelStock { .. })));

        let fresh = AppState::new(db_path).unwrap();
        let api = &fresh.ledger_api;
        assert_eq!(api.label_availability(Some(5), Some(5), None).unwrap(), 2);
        for (id, result) in &results {
            let expected = if result.is_ok() {
                ProductionStatus::Etiquetado
            } else {
                ProductionStatus::Enlatado
            };
            assert_eq!(api.get_production(id).unwrap().status, expected);
        }
        assert!(api.verify_integrity().unwrap().is_clean());
    }
}
