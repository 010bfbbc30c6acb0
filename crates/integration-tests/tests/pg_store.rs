//! Ledger operations against `PostgreSQL` using testcontainers.
//!
//! Run with: cargo test -p stockroom-integration-tests --features postgres --test pg_store
//!
//! Each test starts its own `PostgreSQL` container, applies the ledger
//! migrations and drives the ledger over `PgLedgerStore`, so row locks,
//! guarded decrements and constraint names are exercised for real.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use stockroom_core::VariantId;
use stockroom_integration_tests::{Harness, dec};
use stockroom_ledger::db::{LotStore, RepositoryError};
use stockroom_ledger::models::{CustomerInfo, OrderItemInput, OrderRef, PaymentMeta};
use stockroom_ledger::services::StockReceipt;
use stockroom_ledger::{
    ErrorKind, LedgerError, LedgerStore, LedgerTx, PgLedgerStore, UnknownArrivalPolicy,
};
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

/// Start `PostgreSQL` and return the container with a migrated pool.
///
/// The container must outlive the pool.
async fn start_postgres() -> (ContainerAsync<GenericImage>, PgPool) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "stockroom")
        .with_env_var("POSTGRES_PASSWORD", "stockroom")
        .with_env_var("POSTGRES_DB", "stockroom")
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start postgres container");

    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get mapped port");
    let url = format!("postgres://stockroom:stockroom@{host}:{port}/stockroom");

    // The image restarts the server once after initdb.
    let mut attempts = 0;
    let pool = loop {
        match PgPoolOptions::new().max_connections(16).connect(&url).await {
            Ok(pool) => break pool,
            Err(_) if attempts < 40 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(err) => panic!("PostgreSQL never accepted connections: {err}"),
        }
    };

    stockroom_ledger::migrate(&pool)
        .await
        .expect("Failed to run migrations");

    (container, pool)
}

async fn harness() -> (ContainerAsync<GenericImage>, Harness<PgLedgerStore>) {
    let (container, pool) = start_postgres().await;
    let h = Harness::over(PgLedgerStore::new(pool), UnknownArrivalPolicy::default());
    (container, h)
}

fn line(variant_id: VariantId, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        variant_id,
        quantity,
        sale_price: dec(2500, 2),
    }
}

// =============================================================================
// FIFO and oversell protection
// =============================================================================

#[tokio::test]
async fn test_pg_oldest_arrival_consumed_first() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();

    h.stock_up("B-LATE", 2, &[(v, 5, None, Some(dec(2, 0)))]).await.unwrap();
    h.set_day(1);
    h.stock_up("B-EARLY", 1, &[(v, 5, None, Some(dec(1, 0)))]).await.unwrap();

    let order = h.sell(&[(v, 7)]).await.unwrap();
    assert_eq!(order.items[0].cogs, Some(dec(900, 2)));
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_sales_never_oversell() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();
    // Two lots so concurrent buyers contend on more than one row.
    h.stock_up("B-1", 1, &[(v, 4, None, Some(dec(1, 0)))]).await.unwrap();
    h.stock_up("B-2", 2, &[(v, 6, None, Some(dec(2, 0)))]).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ledger = h.ledger.clone();
        let actor = h.actor.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .orders
                .create_customer_order(
                    &CustomerInfo::default(),
                    &[line(v, 3)],
                    &PaymentMeta::default(),
                    &actor,
                )
                .await
        }));
    }

    let mut sold = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(order) => sold += order.items[0].quantity,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InsufficientStock, "{err}"),
        }
    }

    assert_eq!(sold, 9);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 1);
    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    assert!(lots.iter().all(|l| l.remaining_quantity >= 0));
    let sales = h.ledger.orders.list_customer_orders().await.unwrap();
    assert_eq!(sales.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_crossed_multi_variant_orders_complete() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();
    let w = h.variant("TEE-2").await.unwrap();
    h.stock_up(
        "B-1",
        1,
        &[(v, 40, None, Some(dec(1, 0))), (w, 40, None, Some(dec(1, 0)))],
    )
    .await
    .unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let ledger = h.ledger.clone();
        let actor = h.actor.clone();
        let lines = if i % 2 == 0 {
            vec![line(v, 1), line(w, 1)]
        } else {
            vec![line(w, 1), line(v, 1)]
        };
        tasks.push(tokio::spawn(async move {
            ledger
                .orders
                .create_customer_order(
                    &CustomerInfo::default(),
                    &lines,
                    &PaymentMeta::default(),
                    &actor,
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 30);
    assert_eq!(h.ledger.lots.available_stock(w).await.unwrap(), 30);
}

// =============================================================================
// Atomicity and receipt
// =============================================================================

#[tokio::test]
async fn test_pg_failed_line_rolls_back_whole_order() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();
    let w = h.variant("TEE-2").await.unwrap();
    h.stock_up(
        "B-1",
        1,
        &[(v, 5, None, Some(dec(1, 0))), (w, 1, None, Some(dec(1, 0)))],
    )
    .await
    .unwrap();

    let err = h.sell(&[(v, 2), (w, 3)]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { available: 1, requested: 3, .. }));

    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 5);
    assert!(h.ledger.orders.list_customer_orders().await.unwrap().is_empty());
    let history = h.ledger.audit.list_for_variant(v).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_receipts_create_one_lot_per_line() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();
    let po = h
        .purchase_order("B-1", None, None, &[(v, 5, None, Some(dec(1, 0)))])
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let ledger = h.ledger.clone();
        let actor = h.actor.clone();
        let id = po.order.id;
        tasks.push(tokio::spawn(async move {
            ledger.orders.receive_purchase_order(id, &actor).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().has_arrived);
    }

    assert_eq!(h.ledger.lots.list_lots(v).await.unwrap().len(), 1);
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 5);
    let entries = h
        .ledger
        .audit
        .list_for_order(OrderRef::Purchase(po.order.id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_resize_racing_receipt_completes() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();

    for round in 0..10 {
        let po = h
            .purchase_order(&format!("B-{round}"), None, None, &[(v, 5, None, Some(dec(1, 0)))])
            .await
            .unwrap();
        let item_id = po.items[0].id;

        let receiving = {
            let ledger = h.ledger.clone();
            let actor = h.actor.clone();
            tokio::spawn(async move {
                ledger
                    .orders
                    .receive_purchase_order(po.order.id, &actor)
                    .await
            })
        };
        let resizing = {
            let ledger = h.ledger.clone();
            let actor = h.actor.clone();
            tokio::spawn(async move {
                ledger
                    .orders
                    .update_purchase_order_item_quantity(item_id, 7, &actor)
                    .await
            })
        };

        receiving.await.unwrap().unwrap();
        assert_eq!(resizing.await.unwrap().unwrap().quantity_ordered, 7);
    }

    // Whichever ran first, every lot ends up holding the new quantity.
    let lots = h.ledger.lots.list_lots(v).await.unwrap();
    assert_eq!(lots.len(), 10);
    assert!(lots.iter().all(|l| l.original_quantity == 7 && l.remaining_quantity == 7));
    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 70);
}

// =============================================================================
// Constraints
// =============================================================================

#[tokio::test]
async fn test_pg_constraint_violations_are_conflicts() {
    let (_container, h) = harness().await;
    let v = h.variant("TEE-1").await.unwrap();
    let po = h
        .purchase_order("B-1", None, None, &[(v, 2, None, Some(dec(1, 0)))])
        .await
        .unwrap();

    let err = h.purchase_order("B-1", None, None, &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let receipt = StockReceipt {
        variant_id: v,
        quantity: 2,
        cost_source: None,
        purchase_order_item_id: po.items[0].id,
        arrival_date: None,
    };
    let lot = h.ledger.lots.receive_stock(&receipt).await.unwrap();
    let err = h.ledger.lots.receive_stock(&receipt).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let mut tx = h.store.begin().await.unwrap();
    let err = tx.consume_from_lot(lot.id, 3).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    tx.rollback().await.unwrap();

    let mut tx = h.store.begin().await.unwrap();
    let err = tx.resize_lot(lot.id, 1, 2).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    tx.rollback().await.unwrap();

    assert_eq!(h.ledger.lots.available_stock(v).await.unwrap(), 2);
}
