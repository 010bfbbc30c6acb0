//! Integration tests for FIFO lot consumption and COGS.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use rust_decimal::Decimal;
use stockroom_core::InventoryLotId;
use stockroom_integration_tests::{Harness, dec};
use stockroom_ledger::models::InventoryLot;
use stockroom_ledger::{ErrorKind, LedgerError, UnknownArrivalPolicy};

fn remaining(lots: &[InventoryLot]) -> HashMap<InventoryLotId, i32> {
    lots.iter().map(|l| (l.id, l.remaining_quantity)).collect()
}

// =============================================================================
// Ordering and COGS
// =============================================================================

#[tokio::test]
async fn test_oldest_arrival_consumed_first() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();

    // The later batch is logged and received first; arrival date decides.
    h.stock_up("B-LATE", 2, &[(v, 5, None, Some(dec(2, 0)))]).await.unwrap();
    h.set_day(1);
    h.stock_up("B-EARLY", 1, &[(v, 5, None, Some(dec(1, 0)))]).await.unwrap();

    let order = h.sell(&[(v, 7)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(900, 2)));

    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    let by_cost: Vec<(Option<Decimal>, i32)> =
        lots.iter().map(|l| (l.cost_usd, l.remaining_quantity)).collect();
    assert_eq!(by_cost, vec![(Some(dec(1, 0)), 0), (Some(dec(2, 0)), 3)]);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cogs_rounded_once() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    let third = Decimal::ONE / Decimal::from(3);
    h.ledger
        .lots
        .add_manual_lot(
            &stockroom_ledger::services::ManualLot {
                variant_id: v,
                quantity: 3,
                cost_source: None,
                cost_usd: Some(third),
            },
            &h.actor,
        )
        .await
        .unwrap();

    let order = h.sell(&[(v, 3)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(100, 2)));
}

#[tokio::test]
async fn test_source_cost_converted_at_read_time() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    // Rate 7 source units per USD; receipt derives 10.00 USD per unit.
    let po = h
        .purchase_order("B-1", Some(dec(7, 0)), None, &[(v, 4, Some(dec(70, 0)), None)])
        .await
        .unwrap();
    h.ledger.orders.receive_purchase_order(po.order.id, &h.actor).await.unwrap();

    let order = h.sell(&[(v, 2)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(2000, 2)));
}

#[tokio::test]
async fn test_costing_gap_counts_as_zero() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    // No rate and no USD cost: the lot's cost is unknown.
    h.stock_up("B-GAP", 1, &[(v, 2, Some(dec(35, 0)), None)]).await.unwrap();
    h.stock_up("B-OK", 2, &[(v, 2, None, Some(dec(5, 0)))]).await.unwrap();

    let line = h.pending_line(v, 3).await.unwrap();
    let outcome = h.ledger.fulfillment.fulfill(v, 3, line).await.unwrap();

    assert_eq!(outcome.cogs_usd, dec(500, 2));
    assert_eq!(outcome.item.cogs, Some(dec(500, 2)));
    assert_eq!(outcome.costing_gaps.len(), 1);
    assert_eq!(outcome.costing_gaps[0].quantity, 2);
}

// =============================================================================
// Insufficient stock
// =============================================================================

#[tokio::test]
async fn test_insufficient_stock_leaves_lots_untouched() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    h.stock_up("B-1", 1, &[(v, 2, None, Some(dec(1, 0)))]).await.unwrap();
    let before = h.ledger.lots.list_lots(v).await.unwrap();

    let line = h.pending_line(v, 3).await.unwrap();
    let err = h.ledger.fulfillment.fulfill(v, 3, line).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert!(matches!(
        err,
        LedgerError::InsufficientStock { ref variant, available: 2, requested: 3 }
            if variant == "Tee TEE-1 (Black, M) - SKU: TEE-1"
    ));
    assert_eq!(h.ledger.lots.list_lots(v).await.unwrap(), before);
}

#[tokio::test]
async fn test_fulfill_rejects_non_positive_quantity() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    let line = h.pending_line(v, 1).await.unwrap();

    let err = h.ledger.fulfillment.fulfill(v, 0, line).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_fulfill_unknown_line_rolls_back() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    h.stock_up("B-1", 1, &[(v, 2, None, Some(dec(1, 0)))]).await.unwrap();

    let err = h
        .ledger
        .fulfillment
        .fulfill(v, 1, 9_999.into())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let h = Harness::new();
    let v = h.variant("TEE-1").await.unwrap();
    h.stock_up("B-1", 1, &[(v, 10, None, Some(dec(1, 0)))]).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ledger = h.ledger.clone();
        let actor = h.actor.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .orders
                .create_customer_order(
                    &stockroom_ledger::models::CustomerInfo::default(),
                    &[stockroom_ledger::models::OrderItemInput {
                        variant_id: v,
                        quantity: 3,
                        sale_price: dec(2500, 2),
                    }],
                    &stockroom_ledger::models::PaymentMeta::default(),
                    &actor,
                )
                .await
        }));
    }

    let mut sold = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(order) => sold += order.items[0].quantity,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientStock),
        }
    }

    assert_eq!(sold, 9);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 1);
    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    assert!(lots.iter().all(|l| l.remaining_quantity >= 0));
}

// =============================================================================
// Unknown arrival policy
// =============================================================================

/// A manual lot (no purchase order, so no arrival date) created on day 2 at
/// $9, and a purchase-order lot arriving on day 5 at $1, received day 6.
async fn mixed_lots(policy: UnknownArrivalPolicy) -> (Harness, stockroom_core::VariantId) {
    let h = Harness::with_policy(policy);
    let v = h.variant("TEE-1").await.unwrap();
    h.set_day(2);
    h.ledger
        .lots
        .add_manual_lot(
            &stockroom_ledger::services::ManualLot {
                variant_id: v,
                quantity: 1,
                cost_source: None,
                cost_usd: Some(dec(9, 0)),
            },
            &h.actor,
        )
        .await
        .unwrap();
    h.set_day(6);
    h.stock_up("B-1", 5, &[(v, 1, None, Some(dec(1, 0)))]).await.unwrap();
    (h, v)
}

#[tokio::test]
async fn test_unknown_arrival_epoch_sorts_first() {
    let (h, v) = mixed_lots(UnknownArrivalPolicy::Epoch).await;
    let order = h.sell(&[(v, 1)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(900, 2)));
}

#[tokio::test]
async fn test_unknown_arrival_lot_created_uses_creation_time() {
    let (h, v) = mixed_lots(UnknownArrivalPolicy::LotCreated).await;
    // Created day 2, before the day 5 arrival.
    let order = h.sell(&[(v, 1)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(900, 2)));
}

#[tokio::test]
async fn test_unknown_arrival_last_sorts_after_known() {
    let (h, v) = mixed_lots(UnknownArrivalPolicy::Last).await;
    let order = h.sell(&[(v, 1)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(100, 2)));

    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    assert_eq!(remaining(&lots).values().sum::<i32>(), 1);
    assert_eq!(lots[1].cost_usd, Some(dec(9, 0)));
}

/// Batches of 3 @ $1 (day 1) and 5 @ $2 (day 2); the first 3 units are
/// sold on day 3 and that sale is voided, restocking them at $1.
async fn restocked_after_void(policy: UnknownArrivalPolicy) -> (Harness, stockroom_core::VariantId) {
    let h = Harness::with_policy(policy);
    let v = h.variant("TEE-1").await.unwrap();
    h.stock_up("B-1", 1, &[(v, 3, None, Some(dec(1, 0)))]).await.unwrap();
    h.stock_up("B-2", 2, &[(v, 5, None, Some(dec(2, 0)))]).await.unwrap();
    h.set_day(3);

    let sale = h.sell(&[(v, 3)]).await.unwrap();
    assert_eq!(sale.items[0].cogs, Some(dec(300, 2)));
    h.ledger
        .orders
        .void_customer_order(sale.order.id, &h.actor)
        .await
        .unwrap();
    (h, v)
}

#[tokio::test]
async fn test_restocked_units_sell_first_under_epoch() {
    let (h, v) = restocked_after_void(UnknownArrivalPolicy::Epoch).await;
    let order = h.sell(&[(v, 1)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(100, 2)));
}

#[tokio::test]
async fn test_restocked_units_sell_last_under_lot_created() {
    let (h, v) = restocked_after_void(UnknownArrivalPolicy::LotCreated).await;
    let order = h.sell(&[(v, 6)]).await.unwrap();
    // All of B-2 first, then one restocked unit.
    assert_eq!(order.items[0].cogs, Some(dec(1100, 2)));
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 2);
}
