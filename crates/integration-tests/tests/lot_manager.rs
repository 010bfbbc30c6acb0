//! Integration tests for lot creation, write-offs and the stock audit log.

#![allow(clippy::unwrap_used)]

use stockroom_core::StockChangeReason;
use stockroom_integration_tests::{Harness, dec, day};
use stockroom_ledger::models::OrderRef;
use stockroom_ledger::services::{ManualLot, StockReceipt};
use stockroom_ledger::{ErrorKind, LedgerError};

fn manual(variant_id: stockroom_core::VariantId, quantity: i32) -> ManualLot {
    ManualLot {
        variant_id,
        quantity,
        cost_source: None,
        cost_usd: Some(dec(3, 0)),
    }
}

// =============================================================================
// Receipt costing
// =============================================================================

#[tokio::test]
async fn test_receipt_derives_usd_cost_rounded_half_up() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    // 0.01 / 2 = 0.005, which rounds up to 0.01.
    let po = h
        .purchase_order("B-1", Some(dec(2, 0)), None, &[(v, 1, Some(dec(1, 2)), None)])
        .await
        .unwrap();

    let lot = h
        .ledger
        .lots
        .receive_stock(&StockReceipt {
            variant_id: v,
            quantity: 1,
            cost_source: Some(dec(1, 2)),
            purchase_order_item_id: po.items[0].id,
            arrival_date: None,
        })
        .await
        .unwrap();

    assert_eq!(lot.cost_usd, Some(dec(1, 2)));
    assert_eq!(lot.cost_source, Some(dec(1, 2)));
    assert_eq!(lot.arrival_date, day(0));
    assert_eq!(lot.remaining_quantity, 1);
}

#[tokio::test]
async fn test_receipt_without_rate_uses_line_usd_or_nothing() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    let po = h
        .purchase_order(
            "B-1",
            None,
            None,
            &[(v, 1, Some(dec(9, 0)), Some(dec(4, 0))), (v, 1, Some(dec(9, 0)), None)],
        )
        .await
        .unwrap();

    let receipt = |index: usize| StockReceipt {
        variant_id: v,
        quantity: 1,
        cost_source: Some(dec(9, 0)),
        purchase_order_item_id: po.items[index].id,
        arrival_date: Some(day(3)),
    };
    let with_usd = h.ledger.lots.receive_stock(&receipt(0)).await.unwrap();
    let unknown = h.ledger.lots.receive_stock(&receipt(1)).await.unwrap();

    assert_eq!(with_usd.cost_usd, Some(dec(4, 0)));
    assert_eq!(unknown.cost_usd, None);
    assert_eq!(unknown.arrival_date, day(3));
}

#[tokio::test]
async fn test_receipt_errors() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    let po = h
        .purchase_order("B-1", None, None, &[(v, 1, None, Some(dec(1, 0)))])
        .await
        .unwrap();
    let receipt = StockReceipt {
        variant_id: v,
        quantity: 1,
        cost_source: None,
        purchase_order_item_id: po.items[0].id,
        arrival_date: None,
    };

    let err = h
        .ledger
        .lots
        .receive_stock(&StockReceipt {
            quantity: 0,
            ..receipt.clone()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .ledger
        .lots
        .receive_stock(&StockReceipt {
            purchase_order_item_id: 999.into(),
            ..receipt.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "purchase order item", .. }));

    h.ledger.lots.receive_stock(&receipt).await.unwrap();
    let err = h.ledger.lots.receive_stock(&receipt).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_receipt_rejects_variant_other_than_the_line() {
    let h = Harness::new();
    let ordered = h.variant("TEE-1").await.unwrap();
    let other = h.variant("TEE-2").await.unwrap();
    let po = h
        .purchase_order("B-1", None, None, &[(ordered, 4, None, Some(dec(1, 0)))])
        .await
        .unwrap();

    let err = h
        .ledger
        .lots
        .receive_stock(&StockReceipt {
            variant_id: other,
            quantity: 4,
            cost_source: None,
            purchase_order_item_id: po.items[0].id,
            arrival_date: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.ledger.lots.available_stock(other).await.unwrap(), 0);
    assert!(h.ledger.lots.list_lots(ordered).await.unwrap().is_empty());
}

// =============================================================================
// Manual lots and write-offs
// =============================================================================

#[tokio::test]
async fn test_manual_lot_and_write_off_are_audited() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();

    let lot = h.ledger.lots.add_manual_lot(&manual(v, 5), &h.actor).await.unwrap();
    assert_eq!(lot.purchase_order_item_id, None);
    assert_eq!(lot.cost_usd, Some(dec(3, 0)));

    h.set_day(1);
    let consumption = h
        .ledger
        .fulfillment
        .write_off(v, 2, &h.actor)
        .await
        .unwrap();
    assert_eq!(consumption.cogs_usd, dec(6, 0));
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 3);

    let history = h.ledger.audit.list_for_variant(v).await.unwrap();
    let changes: Vec<_> = history
        .iter()
        .map(|e| (e.change, e.reason, e.order, e.change_time))
        .collect();
    assert_eq!(
        changes,
        vec![
            (-2, StockChangeReason::Manual, OrderRef::Manual, day(1)),
            (5, StockChangeReason::Manual, OrderRef::Manual, day(0)),
        ]
    );
    assert!(history.iter().all(|e| e.actor == h.actor));
}

#[tokio::test]
async fn test_manual_lot_validation() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();

    let err = h
        .ledger
        .lots
        .add_manual_lot(
            &ManualLot {
                cost_usd: None,
                ..manual(v, 1)
            },
            &h.actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .ledger
        .lots
        .add_manual_lot(&manual(v, -1), &h.actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .ledger
        .lots
        .add_manual_lot(&manual(55.into(), 1), &h.actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_write_off_beyond_stock_changes_nothing() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    h.ledger.lots.add_manual_lot(&manual(v, 2), &h.actor).await.unwrap();

    let err = h
        .ledger
        .fulfillment
        .write_off(v, 3, &h.actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 2);
    assert_eq!(h.ledger.audit.list_for_variant(v).await.unwrap().len(), 1);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_queries_on_unknown_variant() {
    let h = Harness::new();
    let missing = 321.into();

    for err in [
        h.ledger.lots.available_stock(missing).await.unwrap_err(),
        h.ledger.lots.list_lots(missing).await.map(|_| ()).unwrap_err(),
        h.ledger.audit.list_for_variant(missing).await.map(|_| ()).unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test]
async fn test_consumed_lots_stay_listed() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    h.ledger.lots.add_manual_lot(&manual(v, 2), &h.actor).await.unwrap();
    h.sell(&[(v, 2)]).await.unwrap();

    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].remaining_quantity, 0);
    assert_eq!(lots[0].consumed_quantity(), 2);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 0);
}
