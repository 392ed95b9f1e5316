// ==========================================
// 生产批次流转测试
// ==========================================
// 职责: 验证空罐领用、状态机约束、标签领用、合并与报废
// ==========================================


#[cfg(test)]
mod production_flow_test {
    use brewery_ledger::api::{AdvanceProductionRequest, ApiError, MovementQuery, ReceiveLabelsRequest, StockQuery};
    use brewery_ledger::domain::ProductionStatus;

    use crate::test_helpers::{
        advance_to, create_production, create_test_state, label_with_catalog, receive_cans,
    };

    fn receive_catalog_labels(
        api: &brewery_ledger::api::LedgerApi,
        brand_id: i64,
        style_id: i64,
        quantity: i64,
    ) {
        api.receive_labels(&ReceiveLabelsRequest {
            brand_id: Some(brand_id),
            style_id: Some(style_id),
            quantity,
            provider: Some("Imprenta Norte".to_string()),
            ..Default::default()
        })
        .unwrap();
    }

    fn movements_for(api: &brewery_ledger::api::LedgerApi, reference: &str, movement_type: Option<&str>) -> i64 {
        api.query_movements(&MovementQuery {
            movement_type: movement_type.map(String::from),
            reference_id_prefix: Some(reference.to_string()),
            ..Default::default()
        })
        .unwrap()
        .total
    }

    // ==========================================
    // 空罐领用
    // ==========================================

    #[test]
    fn test_create_production_requires_empty_cans() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();

        let err = create_production(api, 1, 1, 11).unwrap_err();
        let err = err.downcast::<ApiError>().unwrap();
        assert!(matches!(
            *err,
            ApiError::InsufficientEmptyCans {
                available: 10,
                needed: 11
            }
        ));
        assert!(api.list_productions(None).unwrap().is_empty());

        create_production(api, 1, 1, 10).unwrap();
        let err = create_production(api, 1, 1, 1).unwrap_err();
        let err = err.downcast::<ApiError>().unwrap();
        assert!(matches!(
            *err,
            ApiError::InsufficientEmptyCans {
                available: 0,
                needed: 1
            }
        ));

        let summary = api.stock_summary().unwrap();
        assert_eq!(summary.empty_cans, 0);
        assert_eq!(summary.in_process, 10);
    }

    #[test]
    fn test_scrap_empty_cans_is_bounded_by_net() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 8).unwrap();

        api.scrap_empty_cans(3, Some("abolladas".to_string())).unwrap();
        let err = api.scrap_empty_cans(6, None).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientEmptyCans {
                available: 5,
                needed: 6
            }
        ));
        assert_eq!(
            api.query_net_stock(&StockQuery {
                pool: "EMPTY_CANS".to_string(),
                ..Default::default()
            })
            .unwrap(),
            5
        );
    }

    #[test]
    fn test_non_positive_quantity_is_invalid_input() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();

        let err = create_production(api, 1, 1, 0).unwrap_err();
        let err = err.downcast::<ApiError>().unwrap();
        assert_eq!(err.code(), "INVALID_INPUT");

        let id = create_production(api, 1, 1, 5).unwrap();
        let err = api.scrap_production(&id, -1).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    // ==========================================
    // 状态机
    // ==========================================

    #[test]
    fn test_revisit_is_rejected() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        receive_catalog_labels(api, 1, 1, 10);
        let id = create_production(api, 1, 1, 5).unwrap();

        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        api.advance_production(&label_with_catalog(&id, 1, 1)).unwrap();

        let err = api
            .advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap_err();
        assert!(matches!(err, ApiError::RevisitNotAllowed { .. }));
        assert_eq!(err.code(), "REVISIT_NOT_ALLOWED");

        let err = api
            .advance_production(&advance_to(&id, ProductionStatus::Enlatado))
            .unwrap_err();
        assert!(matches!(err, ApiError::RevisitNotAllowed { .. }));

        assert_eq!(api.get_production(&id).unwrap().status, ProductionStatus::Etiquetado);
    }

    #[test]
    fn test_final_requires_prior_stage() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        let id = create_production(api, 1, 1, 5).unwrap();

        let err = api
            .advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap_err();
        assert!(matches!(err, ApiError::FinalRequiresPriorStage { .. }));
        assert_eq!(api.get_production(&id).unwrap().status, ProductionStatus::Enlatado);
        assert_eq!(movements_for(api, &id, Some("PROD_FINAL_IN")), 0);
    }

    #[test]
    fn test_final_is_terminal() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        let id = create_production(api, 1, 1, 5).unwrap();

        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        let resp = api
            .advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();
        assert_eq!(resp.status, ProductionStatus::Final);
        assert_eq!(resp.merged_into, None);

        for target in [ProductionStatus::Final, ProductionStatus::Etiquetado] {
            let err = api.advance_production(&advance_to(&id, target)).unwrap_err();
            assert!(matches!(err, ApiError::TerminalState(_)));
        }
    }

    #[test]
    fn test_self_transition_is_idempotent() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        let id = create_production(api, 1, 1, 5).unwrap();

        let history_before = api.production_history(&id).unwrap().len();
        let movements_before = movements_for(api, &id, None);

        let resp = api
            .advance_production(&advance_to(&id, ProductionStatus::Enlatado))
            .unwrap();
        assert_eq!(resp.status, ProductionStatus::Enlatado);

        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();

        assert_eq!(api.production_history(&id).unwrap().len(), history_before + 1);
        assert_eq!(movements_for(api, &id, None), movements_before);
    }

    #[test]
    fn test_unknown_status_and_production() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;

        let err = api
            .advance_production(&AdvanceProductionRequest {
                production_id: "nope".to_string(),
                target_status: "BOTTLED".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = api
            .advance_production(&advance_to("nope", ProductionStatus::Pausterizado))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(matches!(api.get_production("nope").unwrap_err(), ApiError::NotFound(_)));
    }

    // ==========================================
    // 标签领用
    // ==========================================

    #[test]
    fn test_label_shortfall_leaves_status_unchanged() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 100).unwrap();
        receive_catalog_labels(api, 3, 7, 10);

        let first = create_production(api, 3, 7, 4).unwrap();
        api.advance_production(&label_with_catalog(&first, 3, 7)).unwrap();
        assert_eq!(api.label_availability(Some(3), Some(7), None).unwrap(), 6);

        let second = create_production(api, 3, 7, 7).unwrap();
        let err = api.advance_production(&label_with_catalog(&second, 3, 7)).unwrap_err();
        match &err {
            ApiError::InsufficientLabelStock {
                available, needed, ..
            } => {
                assert_eq!(*available, 6);
                assert_eq!(*needed, 7);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let details = err.details().unwrap();
        assert_eq!(details["available"], 6);
        assert_eq!(details["needed"], 7);

        let second = api.get_production(&second).unwrap();
        assert_eq!(second.status, ProductionStatus::Enlatado);
        assert_eq!(second.label_brand_id, None);
        assert_eq!(api.label_availability(Some(3), Some(7), None).unwrap(), 6);
        assert_eq!(movements_for(api, "label:catalog:3:7", Some("LABEL_CONS")), 1);
    }

    #[test]
    fn test_labeling_requires_selection() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        let id = create_production(api, 1, 1, 5).unwrap();

        let err = api
            .advance_production(&advance_to(&id, ProductionStatus::Etiquetado))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingLabelSelection));

        let err = api
            .advance_production(&AdvanceProductionRequest {
                production_id: id.clone(),
                target_status: "ETIQUETADO".to_string(),
                label_name: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingLabelSelection));
    }

    #[test]
    fn test_catalog_label_overrides_finished_key() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        receive_catalog_labels(api, 2, 3, 10);

        let id = create_production(api, 1, 1, 4).unwrap();
        api.advance_production(&label_with_catalog(&id, 2, 3)).unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();

        let by_key = |brand_id, style_id| {
            api.query_net_stock(&StockQuery {
                pool: "FINISHED_GOODS".to_string(),
                brand_id: Some(brand_id),
                style_id: Some(style_id),
                ..Default::default()
            })
            .unwrap()
        };
        assert_eq!(by_key(2, 3), 4);
        assert_eq!(by_key(1, 1), 0);
    }

    #[test]
    fn test_custom_label_keeps_own_key() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        api.receive_labels(&ReceiveLabelsRequest {
            label_name: Some("Aniversario".to_string()),
            quantity: 5,
            ..Default::default()
        })
        .unwrap();

        let id = create_production(api, 4, 9, 5).unwrap();
        api.advance_production(&AdvanceProductionRequest {
            production_id: id.clone(),
            target_status: "ETIQUETADO".to_string(),
            label_name: Some("Aniversario".to_string()),
            ..Default::default()
        })
        .unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();

        assert_eq!(api.label_availability(None, None, Some("Aniversario")).unwrap(), 0);
        assert_eq!(
            api.query_net_stock(&StockQuery {
                pool: "FINISHED_GOODS".to_string(),
                brand_id: Some(4),
                style_id: Some(9),
                ..Default::default()
            })
            .unwrap(),
            5
        );
    }

    // ==========================================
    // 合并
    // ==========================================

    #[test]
    fn test_final_merge_leaves_single_row() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 100).unwrap();

        let first = create_production(api, 5, 5, 10).unwrap();
        let second = create_production(api, 5, 5, 6).unwrap();
        for id in [&first, &second] {
            api.advance_production(&advance_to(id, ProductionStatus::Pausterizado))
                .unwrap();
        }

        let resp = api
            .advance_production(&advance_to(&first, ProductionStatus::Final))
            .unwrap();
        assert_eq!(resp.merged_into, None);
        let resp = api
            .advance_production(&advance_to(&second, ProductionStatus::Final))
            .unwrap();
        assert_eq!(resp.merged_into.as_deref(), Some(first.as_str()));

        let finals = api.list_productions(Some("FINAL")).unwrap();
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].id, first);
        assert_eq!(finals[0].quantity, 16);

        let final_in = api
            .query_movements(&MovementQuery {
                movement_type: Some("PROD_FINAL_IN".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(final_in.total, 2);

        assert!(matches!(api.get_production(&second).unwrap_err(), ApiError::NotFound(_)));
        assert!(matches!(api.production_history(&second).unwrap_err(), ApiError::NotFound(_)));
        // 被合并批次的身份只保留在台账中
        assert_eq!(movements_for(api, &second, None), 2);

        let history = api.production_history(&first).unwrap();
        assert!(history.last().unwrap().note.as_deref().unwrap().contains(&second));
        assert!(api.verify_integrity().unwrap().is_clean());
    }

    // ==========================================
    // 报废
    // ==========================================

    #[test]
    fn test_scrap_reduces_quantity_and_guards_over_scrap() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 20).unwrap();
        let id = create_production(api, 1, 2, 10).unwrap();

        let resp = api.scrap_production(&id, 3).unwrap();
        assert_eq!(resp.new_qty, 7);

        let err = api.scrap_production(&id, 8).unwrap_err();
        assert!(matches!(
            err,
            ApiError::OverScrap {
                available: 7,
                requested: 8,
                ..
            }
        ));
        assert_eq!(api.get_production(&id).unwrap().quantity, 7);
        assert_eq!(api.stock_summary().unwrap().in_process, 7);
        assert_eq!(api.get_production(&id).unwrap().status, ProductionStatus::Enlatado);
    }

    #[test]
    fn test_scrap_of_final_lot_reduces_finished_goods() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 20).unwrap();
        let id = create_production(api, 1, 2, 10).unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();

        api.scrap_production(&id, 4).unwrap();
        let summary = api.stock_summary().unwrap();
        assert_eq!(summary.finished_goods, 6);
        assert_eq!(summary.in_process, 0);
        assert!(api.verify_integrity().unwrap().is_clean());
    }

    #[test]
    fn test_history_is_oldest_first() {
        let (_temp, state) = create_test_state().unwrap();
        let api = &state.ledger_api;
        receive_cans(api, 10).unwrap();
        let id = create_production(api, 1, 1, 5).unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Pausterizado))
            .unwrap();
        api.advance_production(&advance_to(&id, ProductionStatus::Final))
            .unwrap();

        let statuses: Vec<_> = api
            .production_history(&id)
            .unwrap()
            .into_iter()
            .map(|h| (h.from_status, h.to_status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (None, ProductionStatus::Enlatado),
                (Some(ProductionStatus::Enlatado), ProductionStatus::Pausterizado),
                (Some(ProductionStatus::Pausterizado), ProductionStatus::Final),
            ]
        );
    }
}
