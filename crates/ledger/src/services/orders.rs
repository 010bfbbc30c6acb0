//! Order lifecycle: customer orders, purchase-order receipt, voids and
//! purchase-order line edits.
//!
//! Every operation runs in one store transaction. An error drops the
//! transaction, so nothing it wrote persists.
//!
//! ```text
//! PurchaseOrder:  logged ──receive──▶ arrived        (once; repeat is a no-op)
//! CustomerOrder:  ACTIVE ──void─────▶ CANCELLED      (terminal)
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockroom_core::{
    Actor, CustomerOrderId, CustomerOrderStatus, FulfillmentStatus, PurchaseOrderId,
    PurchaseOrderItemId, StockChangeReason, VariantId, round_currency,
};

use super::audit::StockAuditLog;
use super::fulfillment::{FulfillmentEngine, UnknownArrivalPolicy};
use super::lots::{InventoryLotManager, StockReceipt};
use crate::clock::Clock;
use crate::db::{
    CustomerOrderStore, LedgerStore, LedgerTx, LotStore, PurchaseOrderStore, VariantStore,
};
use crate::error::LedgerError;
use crate::models::{
    CustomerInfo, CustomerOrder, CustomerOrderWithItems, InventoryLot, NewCustomerOrder,
    NewCustomerOrderItem, NewLot, NewPurchaseOrder, NewPurchaseOrderItem, NewStockChange,
    OrderItemInput, OrderRef, PaymentMeta, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderWithItems, UpdateCustomerOrderInput,
};

/// Orchestrates order state changes over the lot manager, the FIFO engine
/// and the audit log.
#[derive(Clone)]
pub struct OrderLifecycle<S> {
    store: S,
    clock: Arc<dyn Clock>,
    lots: InventoryLotManager<S>,
    fulfillment: FulfillmentEngine<S>,
    audit: StockAuditLog<S>,
}

impl<S: LedgerStore> OrderLifecycle<S> {
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: UnknownArrivalPolicy) -> Self {
        Self {
            lots: InventoryLotManager::new(store.clone(), Arc::clone(&clock), policy),
            fulfillment: FulfillmentEngine::new(store.clone(), Arc::clone(&clock), policy),
            audit: StockAuditLog::new(store.clone()),
            store,
            clock,
        }
    }

    // =========================================================================
    // Customer orders
    // =========================================================================

    /// Create a customer order and fulfill every line from FIFO lots.
    ///
    /// Lines are fulfilled in submission order, so an earlier line gets first
    /// claim on scarce stock. If any line cannot be fulfilled the whole order
    /// is rolled back.
    ///
    /// # Errors
    ///
    /// - `Validation` if `items` is empty or a quantity is not positive
    /// - `NotFound` if a variant does not exist
    /// - `InsufficientStock` if any line cannot be covered
    #[instrument(skip_all, fields(lines = items.len(), actor = %actor))]
    pub async fn create_customer_order(
        &self,
        customer: &CustomerInfo,
        items: &[OrderItemInput],
        payment: &PaymentMeta,
        actor: &Actor,
    ) -> Result<CustomerOrderWithItems, LedgerError> {
        if items.is_empty() {
            return Err(LedgerError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        if let Some(bad) = items.iter().find(|item| item.quantity <= 0) {
            return Err(LedgerError::Validation(format!(
                "quantity for variant {} must be positive, got {}",
                bad.variant_id, bad.quantity
            )));
        }
        if let Some(bad) = items.iter().find(|item| item.sale_price < Decimal::ZERO) {
            return Err(LedgerError::Validation(format!(
                "sale price for variant {} cannot be negative",
                bad.variant_id
            )));
        }

        let mut tx = self.store.begin().await?;
        for input in items {
            if tx.get_variant(input.variant_id).await?.is_none() {
                return Err(LedgerError::not_found("variant", input.variant_id));
            }
        }

        // Lot locks are always taken in ascending variant order.
        let mut variants: Vec<VariantId> = items.iter().map(|item| item.variant_id).collect();
        variants.sort_unstable();
        variants.dedup();
        for variant_id in variants {
            tx.lock_available_lots(variant_id).await?;
        }

        let now = self.clock.now();
        let order = tx
            .insert_customer_order(&NewCustomerOrder {
                customer_name: customer.display_name(),
                order_date: now,
                money_holder: payment.money_holder.clone(),
                payment_method: payment.payment_method.clone(),
            })
            .await?;

        let mut created = Vec::with_capacity(items.len());
        for input in items {
            let item = tx
                .insert_customer_order_item(
                    order.id,
                    &NewCustomerOrderItem {
                        variant_id: input.variant_id,
                        quantity: input.quantity,
                        sale_price: input.sale_price,
                    },
                )
                .await?;
            created.push(item);
        }

        let mut fulfilled = Vec::with_capacity(created.len());
        for item in created {
            let outcome = self
                .fulfillment
                .fulfill_in(&mut tx, item.variant_id, item.quantity, item.id)
                .await?;
            self.audit
                .record_in(
                    &mut tx,
                    &NewStockChange {
                        variant_id: item.variant_id,
                        change: -item.quantity,
                        change_time: now,
                        reason: StockChangeReason::Sale,
                        actor: actor.clone(),
                        order: OrderRef::Customer(order.id),
                    },
                )
                .await?;
            fulfilled.push(outcome.item);
        }

        let order = tx
            .update_customer_order_info(
                order.id,
                &UpdateCustomerOrderInput {
                    fulfillment_status: Some(FulfillmentStatus::Fulfilled),
                    ..Default::default()
                },
            )
            .await?;
        tx.commit().await?;

        info!(order_id = %order.id, lines = fulfilled.len(), "Created customer order");
        Ok(CustomerOrderWithItems {
            order,
            items: fulfilled,
        })
    }

    /// Cancel a customer order and put its units back as new lots.
    ///
    /// Each line with a positive COGS becomes a fresh lot at the line's
    /// average unit cost, dated now and linked back to this order. The lots
    /// the sale consumed stay consumed.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `AlreadyVoided` if it is already cancelled
    #[instrument(skip_all, fields(order_id = %order_id, actor = %actor))]
    pub async fn void_customer_order(
        &self,
        order_id: CustomerOrderId,
        actor: &Actor,
    ) -> Result<Vec<InventoryLot>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_customer_order(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("customer order", order_id))?;
        if order.status == CustomerOrderStatus::Cancelled {
            return Err(LedgerError::AlreadyVoided(order_id));
        }

        let now = self.clock.now();
        let mut restocked = Vec::new();
        for item in tx.list_customer_order_items(order_id).await? {
            let Some(cogs) = item.cogs.filter(|cogs| *cogs > Decimal::ZERO) else {
                continue;
            };
            if item.quantity <= 0 {
                continue;
            }

            let lot = tx
                .insert_lot(&NewLot {
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                    cost_source: None,
                    cost_usd: Some(cogs / Decimal::from(item.quantity)),
                    purchase_order_item_id: None,
                    restocked_from_order_id: Some(order_id),
                    arrival_date: now,
                    created_at: now,
                })
                .await?;
            self.audit
                .record_in(
                    &mut tx,
                    &NewStockChange {
                        variant_id: item.variant_id,
                        change: item.quantity,
                        change_time: now,
                        reason: StockChangeReason::VoidSale,
                        actor: actor.clone(),
                        order: OrderRef::Customer(order_id),
                    },
                )
                .await?;
            restocked.push(lot);
        }

        tx.set_customer_order_status(order_id, CustomerOrderStatus::Cancelled)
            .await?;
        tx.commit().await?;

        info!(order_id = %order_id, lots = restocked.len(), "Voided customer order");
        Ok(restocked)
    }

    /// Edit a customer order's name, money holder or fulfillment status.
    ///
    /// # Errors
    ///
    /// - `Validation` if nothing is set or the name is blank
    /// - `NotFound` if the order does not exist
    /// - `Conflict` if the order is cancelled
    pub async fn update_customer_order_info(
        &self,
        order_id: CustomerOrderId,
        input: &UpdateCustomerOrderInput,
    ) -> Result<CustomerOrder, LedgerError> {
        if input.is_empty() {
            return Err(LedgerError::Validation("nothing to update".to_string()));
        }
        let mut input = input.clone();
        if let Some(name) = input.customer_name.take() {
            let name = name.trim();
            if name.is_empty() {
                return Err(LedgerError::Validation(
                    "customer name cannot be blank".to_string(),
                ));
            }
            input.customer_name = Some(name.to_string());
        }

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_customer_order(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("customer order", order_id))?;
        if order.status == CustomerOrderStatus::Cancelled {
            return Err(LedgerError::Conflict(format!(
                "customer order {order_id} is cancelled"
            )));
        }

        let order = tx.update_customer_order_info(order_id, &input).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// A customer order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist.
    pub async fn get_customer_order(
        &self,
        order_id: CustomerOrderId,
    ) -> Result<CustomerOrderWithItems, LedgerError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_customer_order(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("customer order", order_id))?;
        let items = tx.list_customer_order_items(order_id).await?;
        tx.commit().await?;
        Ok(CustomerOrderWithItems { order, items })
    }

    /// Every customer order with its lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a query fails.
    pub async fn list_customer_orders(&self) -> Result<Vec<CustomerOrderWithItems>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.list_customer_orders().await?;
        let mut listed = Vec::with_capacity(orders.len());
        for order in orders {
            let items = tx.list_customer_order_items(order.id).await?;
            listed.push(CustomerOrderWithItems { order, items });
        }
        tx.commit().await?;
        Ok(listed)
    }

    // =========================================================================
    // Purchase orders
    // =========================================================================

    /// Log a new supplier batch.
    ///
    /// # Errors
    ///
    /// - `Validation` if the batch number is blank or the rate is not positive
    /// - `Conflict` if the batch number already exists
    #[instrument(skip_all, fields(batch_number = %input.batch_number))]
    pub async fn create_purchase_order(
        &self,
        input: &NewPurchaseOrder,
    ) -> Result<PurchaseOrder, LedgerError> {
        let batch_number = input.batch_number.trim();
        if batch_number.is_empty() {
            return Err(LedgerError::Validation(
                "batch number cannot be blank".to_string(),
            ));
        }
        if input
            .usd_to_source_rate
            .is_some_and(|rate| rate <= Decimal::ZERO)
        {
            return Err(LedgerError::Validation(
                "exchange rate must be positive".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let order = tx
            .insert_purchase_order(
                &NewPurchaseOrder {
                    batch_number: batch_number.to_string(),
                    ..input.clone()
                },
                self.clock.now(),
            )
            .await?;
        tx.commit().await?;

        info!(purchase_order_id = %order.id, "Created purchase order");
        Ok(order)
    }

    /// Add a line to a purchase order that has not arrived yet.
    ///
    /// # Errors
    ///
    /// - `Validation` if the quantity is not positive or a cost is negative
    /// - `NotFound` if the order or variant does not exist
    /// - `Conflict` if the order has already arrived
    pub async fn add_purchase_order_item(
        &self,
        purchase_order_id: PurchaseOrderId,
        input: &NewPurchaseOrderItem,
    ) -> Result<PurchaseOrderItem, LedgerError> {
        if input.quantity_ordered <= 0 {
            return Err(LedgerError::Validation(format!(
                "quantity must be positive, got {}",
                input.quantity_ordered
            )));
        }
        if [input.cost_per_item_source, input.cost_per_item_usd]
            .into_iter()
            .flatten()
            .any(|cost| cost < Decimal::ZERO)
        {
            return Err(LedgerError::Validation(
                "item cost cannot be negative".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_purchase_order(purchase_order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("purchase order", purchase_order_id))?;
        if order.has_arrived {
            return Err(LedgerError::Conflict(format!(
                "purchase order {purchase_order_id} has already arrived"
            )));
        }
        if tx.get_variant(input.variant_id).await?.is_none() {
            return Err(LedgerError::not_found("variant", input.variant_id));
        }

        let item = tx
            .insert_purchase_order_item(purchase_order_id, input)
            .await?;
        recompute_total_in(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Receive a purchase order: one lot and one audit entry per line.
    ///
    /// Receiving an order that has already arrived changes nothing and
    /// returns it as is. Lots are dated with the order's arrival date, or
    /// now if it has none.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist.
    #[instrument(skip_all, fields(purchase_order_id = %purchase_order_id, actor = %actor))]
    pub async fn receive_purchase_order(
        &self,
        purchase_order_id: PurchaseOrderId,
        actor: &Actor,
    ) -> Result<PurchaseOrder, LedgerError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_purchase_order(purchase_order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("purchase order", purchase_order_id))?;
        if order.has_arrived {
            tx.rollback().await?;
            info!(purchase_order_id = %purchase_order_id, "Purchase order already received");
            return Ok(order);
        }

        let arrival = order.arrival_date.unwrap_or_else(|| self.clock.now());
        let items = tx.list_purchase_order_items(purchase_order_id).await?;
        for item in items.iter().filter(|item| item.quantity_ordered > 0) {
            self.lots
                .receive_stock_in(
                    &mut tx,
                    &StockReceipt {
                        variant_id: item.variant_id,
                        quantity: item.quantity_ordered,
                        cost_source: item.cost_per_item_source,
                        purchase_order_item_id: item.id,
                        arrival_date: Some(arrival),
                    },
                )
                .await?;
            self.audit
                .record_in(
                    &mut tx,
                    &NewStockChange {
                        variant_id: item.variant_id,
                        change: item.quantity_ordered,
                        change_time: arrival,
                        reason: StockChangeReason::PurchaseOrderReceived,
                        actor: actor.clone(),
                        order: OrderRef::Purchase(purchase_order_id),
                    },
                )
                .await?;
        }

        let order = tx
            .mark_purchase_order_arrived(purchase_order_id, arrival)
            .await?;
        tx.commit().await?;

        info!(
            purchase_order_id = %purchase_order_id,
            lines = items.len(),
            "Received purchase order"
        );
        Ok(order)
    }

    /// Change a purchase-order line's quantity.
    ///
    /// Once the order has arrived the line's lot is resized with it, keeping
    /// the units already sold: the lot becomes `new_quantity` units with
    /// `new_quantity - sold` remaining.
    ///
    /// # Errors
    ///
    /// - `Validation` if `new_quantity` is below 1
    /// - `NotFound` if the line does not exist
    /// - `Conflict` if more than `new_quantity` units were already sold
    #[instrument(skip_all, fields(item_id = %item_id, new_quantity = new_quantity, actor = %actor))]
    pub async fn update_purchase_order_item_quantity(
        &self,
        item_id: PurchaseOrderItemId,
        new_quantity: i32,
        actor: &Actor,
    ) -> Result<PurchaseOrderItem, LedgerError> {
        if new_quantity < 1 {
            return Err(LedgerError::Validation(format!(
                "quantity must be at least 1, got {new_quantity}"
            )));
        }

        let mut tx = self.store.begin().await?;
        let order = lock_order_of_item(&mut tx, item_id).await?;

        let lot = if order.has_arrived {
            tx.lot_for_purchase_order_item(item_id).await?
        } else {
            None
        };
        if let Some(lot) = lot {
            let sold = lot.consumed_quantity();
            if new_quantity < sold {
                return Err(LedgerError::Conflict(format!(
                    "cannot reduce quantity to {new_quantity}: {sold} units already sold"
                )));
            }

            tx.resize_lot(lot.id, new_quantity, new_quantity - sold)
                .await?;
            let delta = new_quantity - lot.original_quantity;
            if delta != 0 {
                self.audit
                    .record_in(
                        &mut tx,
                        &NewStockChange {
                            variant_id: lot.variant_id,
                            change: delta,
                            change_time: self.clock.now(),
                            reason: StockChangeReason::Manual,
                            actor: actor.clone(),
                            order: OrderRef::Purchase(order.id),
                        },
                    )
                    .await?;
            }
            info!(lot_id = %lot.id, sold, delta, "Resized received lot");
        }

        let item = tx
            .set_purchase_order_item_quantity(item_id, new_quantity)
            .await?;
        recompute_total_in(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Change a purchase-order line's USD unit cost.
    ///
    /// Lots already received keep the cost they were received at.
    ///
    /// # Errors
    ///
    /// - `Validation` if the cost is negative
    /// - `NotFound` if the line does not exist
    pub async fn update_purchase_order_item_cost(
        &self,
        item_id: PurchaseOrderItemId,
        cost_per_item_usd: Decimal,
    ) -> Result<PurchaseOrderItem, LedgerError> {
        if cost_per_item_usd < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "item cost cannot be negative".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let order = lock_order_of_item(&mut tx, item_id).await?;

        let item = tx
            .set_purchase_order_item_cost(item_id, cost_per_item_usd)
            .await?;
        recompute_total_in(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// A purchase order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist.
    pub async fn get_purchase_order(
        &self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrderWithItems, LedgerError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_purchase_order(purchase_order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("purchase order", purchase_order_id))?;
        let items = tx.list_purchase_order_items(purchase_order_id).await?;
        tx.commit().await?;
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Every purchase order with its lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a query fails.
    pub async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrderWithItems>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let orders = tx.list_purchase_orders().await?;
        let mut listed = Vec::with_capacity(orders.len());
        for order in orders {
            let items = tx.list_purchase_order_items(order.id).await?;
            listed.push(PurchaseOrderWithItems { order, items });
        }
        tx.commit().await?;
        Ok(listed)
    }
}

/// Sum of quantity times USD unit cost over the lines whose cost is known,
/// or `None` if no line has one.
#[must_use]
pub fn purchase_order_total(order: &PurchaseOrder, items: &[PurchaseOrderItem]) -> Option<Decimal> {
    let rate = order.exchange_rate();
    items
        .iter()
        .filter_map(|item| {
            item.unit_cost_usd(rate)
                .map(|cost| cost * Decimal::from(item.quantity_ordered))
        })
        .reduce(|a, b| a + b)
        .map(round_currency)
}

/// Lock the purchase order owning `item_id`.
///
/// The line is read without a lock. Purchase-order writers always lock the
/// order before its lines and lots.
async fn lock_order_of_item<T: LedgerTx>(
    tx: &mut T,
    item_id: PurchaseOrderItemId,
) -> Result<PurchaseOrder, LedgerError> {
    let item = tx
        .get_purchase_order_item(item_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("purchase order item", item_id))?;
    tx.lock_purchase_order(item.purchase_order_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("purchase order", item.purchase_order_id))
}

async fn recompute_total_in<T: LedgerTx>(
    tx: &mut T,
    order: &PurchaseOrder,
) -> Result<(), LedgerError> {
    let items = tx.list_purchase_order_items(order.id).await?;
    tx.set_purchase_order_total(order.id, purchase_order_total(order, &items))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    fn order(rate: Option<i64>) -> PurchaseOrder {
        PurchaseOrder {
            id: PurchaseOrderId::new(1),
            batch_number: "B-1".to_string(),
            arrival_date: None,
            has_arrived: false,
            total_cost_usd: None,
            usd_to_source_rate: rate.map(Decimal::from),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn item(quantity: i32, source: Option<Decimal>, usd: Option<Decimal>) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: PurchaseOrderItemId::new(quantity),
            purchase_order_id: PurchaseOrderId::new(1),
            variant_id: VariantId::new(1),
            quantity_ordered: quantity,
            cost_per_item_source: source,
            cost_per_item_usd: usd,
        }
    }

    #[test]
    fn test_total_mixes_explicit_and_converted_costs() {
        let items = [
            item(2, None, Some(Decimal::new(250, 2))),
            item(3, Some(Decimal::from(14)), None),
        ];
        // 2 * 2.50 + 3 * (14 / 7)
        assert_eq!(
            purchase_order_total(&order(Some(7)), &items),
            Some(Decimal::new(1100, 2))
        );
    }

    #[test]
    fn test_total_rounds_once() {
        let items = [item(3, Some(Decimal::ONE), None)];
        assert_eq!(
            purchase_order_total(&order(Some(3)), &items),
            Some(Decimal::new(100, 2))
        );
    }

    #[test]
    fn test_total_unknown_without_costs() {
        let items = [item(3, Some(Decimal::ONE), None)];
        assert_eq!(purchase_order_total(&order(None), &items), None);
        assert_eq!(purchase_order_total(&order(Some(3)), &[]), None);
    }
}
