//! Integration tests for the Stockroom ledger.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```
//!
//! The tests drive the public [`Ledger`] API with a manual clock. Most run
//! over the in-memory store and need no database.
//!
//! The `pg_store` suite runs the same operations against `PostgreSQL` in a
//! throwaway container and needs Docker:
//!
//! ```bash
//! cargo test -p stockroom-integration-tests --features postgres --test pg_store
//! ```
//!
//! # Test Categories
//!
//! - `fifo_fulfillment` - Lot ordering, COGS, oversell protection
//! - `order_lifecycle` - Customer orders, receipt, void, PO line edits
//! - `lot_manager` - Receipt costing, manual lots, write-offs, audit log
//! - `pg_store` - Row locks, guarded decrements and constraint mapping

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use stockroom_core::{Actor, CustomerOrderItemId, VariantId};
use stockroom_ledger::db::{CustomerOrderStore, VariantStore};
use stockroom_ledger::models::{
    CustomerInfo, CustomerOrderWithItems, NewCustomerOrder, NewCustomerOrderItem,
    NewPurchaseOrder, NewPurchaseOrderItem, NewVariant, OrderItemInput, PaymentMeta,
    PurchaseOrderWithItems,
};
use stockroom_ledger::{
    Clock, Ledger, LedgerError, LedgerStore, LedgerTx, ManualClock, MemoryLedgerStore,
    UnknownArrivalPolicy,
};

/// Days after 2026-01-01, the harness clock's start.
#[must_use]
pub fn day(n: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_454 + n)
}

/// Shorthand for a decimal with `scale` fractional digits.
#[must_use]
pub fn dec(num: i64, scale: u32) -> Decimal {
    Decimal::new(num, scale)
}

/// One purchase-order line: variant, quantity, source cost, USD cost.
pub type Line = (VariantId, i32, Option<Decimal>, Option<Decimal>);

/// A ledger over an empty store with a clock frozen at [`day`] 0.
pub struct Harness<S = MemoryLedgerStore> {
    pub store: S,
    pub clock: Arc<ManualClock>,
    pub ledger: Ledger<S>,
    pub actor: Actor,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// A fresh in-memory store with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(UnknownArrivalPolicy::default())
    }

    #[must_use]
    pub fn with_policy(policy: UnknownArrivalPolicy) -> Self {
        Self::over(MemoryLedgerStore::new(), policy)
    }
}

impl<S: LedgerStore> Harness<S> {
    /// Drive `store`, which must hold no ledger rows yet.
    #[must_use]
    pub fn over(store: S, policy: UnknownArrivalPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(day(0)));
        let ledger = Ledger::new(store.clone(), Arc::clone(&clock) as Arc<dyn Clock>, policy);
        Self {
            store,
            clock,
            ledger,
            actor: Actor::system(),
        }
    }

    /// Move the clock to `day(n)`.
    pub fn set_day(&self, n: i64) {
        self.clock.set(day(n));
    }

    /// Seed a variant.
    ///
    /// # Errors
    ///
    /// Returns the store error if the insert fails.
    pub async fn variant(&self, sku: &str) -> Result<VariantId, LedgerError> {
        let mut tx = self.store.begin().await?;
        let variant = tx
            .insert_variant(&NewVariant {
                sku: sku.to_string(),
                color: "Black".to_string(),
                size: Some("M".to_string()),
                sale_price: dec(2500, 2),
                display_name: Some(format!("Tee {sku}")),
                ..Default::default()
            })
            .await?;
        tx.commit().await?;
        Ok(variant.id)
    }

    /// Create a purchase order with `lines`.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if creation fails.
    pub async fn purchase_order(
        &self,
        batch_number: &str,
        rate: Option<Decimal>,
        arrival_date: Option<DateTime<Utc>>,
        lines: &[Line],
    ) -> Result<PurchaseOrderWithItems, LedgerError> {
        let orders = &self.ledger.orders;
        let order = orders
            .create_purchase_order(&NewPurchaseOrder {
                batch_number: batch_number.to_string(),
                usd_to_source_rate: rate,
                arrival_date,
            })
            .await?;
        for &(variant_id, quantity_ordered, cost_per_item_source, cost_per_item_usd) in lines {
            orders
                .add_purchase_order_item(
                    order.id,
                    &NewPurchaseOrderItem {
                        variant_id,
                        quantity_ordered,
                        cost_per_item_source,
                        cost_per_item_usd,
                    },
                )
                .await?;
        }
        orders.get_purchase_order(order.id).await
    }

    /// Create and receive a purchase order arriving on `day(arrival)`.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if creation or receipt fails.
    pub async fn stock_up(
        &self,
        batch_number: &str,
        arrival: i64,
        lines: &[Line],
    ) -> Result<PurchaseOrderWithItems, LedgerError> {
        let created = self
            .purchase_order(batch_number, None, Some(day(arrival)), lines)
            .await?;
        self.ledger
            .orders
            .receive_purchase_order(created.order.id, &self.actor)
            .await?;
        self.ledger.orders.get_purchase_order(created.order.id).await
    }

    /// Sell `(variant, quantity)` lines at $25 each.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if the order cannot be created.
    pub async fn sell(
        &self,
        lines: &[(VariantId, i32)],
    ) -> Result<CustomerOrderWithItems, LedgerError> {
        let items: Vec<OrderItemInput> = lines
            .iter()
            .map(|&(variant_id, quantity)| OrderItemInput {
                variant_id,
                quantity,
                sale_price: dec(2500, 2),
            })
            .collect();
        self.ledger
            .orders
            .create_customer_order(
                &CustomerInfo::default(),
                &items,
                &PaymentMeta::default(),
                &self.actor,
            )
            .await
    }

    /// Insert an unfulfilled customer order line directly, for driving the
    /// fulfillment engine on its own.
    ///
    /// # Errors
    ///
    /// Returns the store error if an insert fails.
    pub async fn pending_line(
        &self,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<CustomerOrderItemId, LedgerError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .insert_customer_order(&NewCustomerOrder {
                customer_name: "Guest".to_string(),
                order_date: self.clock.now(),
                money_holder: None,
                payment_method: None,
            })
            .await?;
        let item = tx
            .insert_customer_order_item(
                order.id,
                &NewCustomerOrderItem {
                    variant_id,
                    quantity,
                    sale_price: dec(2500, 2),
                },
            )
            .await?;
        tx.commit().await?;
        Ok(item.id)
    }
}
