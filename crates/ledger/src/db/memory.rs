//! In-memory ledger store for tests and local experiments.
//!
//! Transactions are fully serial: `begin` takes an owned lock on the whole
//! state and works on a private copy, which replaces the shared state only
//! on `commit`. Dropping the transaction releases the lock and discards the
//! copy. Never open a second transaction while holding one on the same task.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_core::{
    CustomerOrderId, CustomerOrderItemId, CustomerOrderStatus, FulfillmentStatus,
    InventoryLotId, PurchaseOrderId, PurchaseOrderItemId, StockChangeId, VariantId,
};

use super::{
    CustomerOrderStore, LedgerStore, LedgerTx, LotStore, PurchaseOrderStore, RepositoryError,
    StockChangeStore, VariantStore,
};
use crate::models::{
    CustomerOrder, CustomerOrderItem, InventoryLot, LotWithOrigin, NewCustomerOrder,
    NewCustomerOrderItem, NewLot, NewPurchaseOrder, NewPurchaseOrderItem, NewStockChange,
    NewVariant, OrderRef, ProductVariant, PurchaseOrder, PurchaseOrderItem, StockChangeEntry,
    UpdateCustomerOrderInput,
};

/// Full contents of an in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub variants: BTreeMap<VariantId, ProductVariant>,
    pub lots: BTreeMap<InventoryLotId, InventoryLot>,
    pub purchase_orders: BTreeMap<PurchaseOrderId, PurchaseOrder>,
    pub purchase_order_items: BTreeMap<PurchaseOrderItemId, PurchaseOrderItem>,
    pub customer_orders: BTreeMap<CustomerOrderId, CustomerOrder>,
    pub customer_order_items: BTreeMap<CustomerOrderItemId, CustomerOrderItem>,
    pub stock_changes: Vec<StockChangeEntry>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn with_origin(&self, lot: &InventoryLot) -> LotWithOrigin {
        let order = lot
            .purchase_order_item_id
            .and_then(|item_id| self.purchase_order_items.get(&item_id))
            .and_then(|item| self.purchase_orders.get(&item.purchase_order_id));

        LotWithOrigin {
            lot: lot.clone(),
            order_arrival_date: order.and_then(|o| o.arrival_date),
            order_exchange_rate: order.and_then(PurchaseOrder::exchange_rate),
        }
    }

    fn lots_of(&self, variant_id: VariantId, only_available: bool) -> Vec<LotWithOrigin> {
        let mut lots: Vec<&InventoryLot> = self
            .lots
            .values()
            .filter(|lot| lot.variant_id == variant_id)
            .filter(|lot| !only_available || lot.remaining_quantity > 0)
            .collect();
        lots.sort_by_key(|lot| (lot.created_at, lot.id));
        lots.into_iter().map(|lot| self.with_origin(lot)).collect()
    }

    fn require_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        if self.variants.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::Conflict(format!(
                "variant {id} does not exist"
            )))
        }
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

/// An open in-memory transaction.
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<MemoryLedgerTx, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryLedgerTx { guard, working })
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn commit(self) -> Result<(), RepositoryError> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl VariantStore for MemoryLedgerTx {
    async fn insert_variant(
        &mut self,
        input: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let id = VariantId::new(self.working.next_id());
        let variant = ProductVariant {
            id,
            sku: input.sku.clone(),
            color: input.color.clone(),
            size: input.size.clone(),
            sale_price: input.sale_price,
            legacy_sku: input.legacy_sku.clone(),
            display_name: input.display_name.clone(),
        };
        self.working.variants.insert(id, variant.clone());
        Ok(variant)
    }

    async fn get_variant(
        &mut self,
        id: VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        Ok(self.working.variants.get(&id).cloned())
    }
}

#[async_trait]
impl LotStore for MemoryLedgerTx {
    async fn insert_lot(&mut self, input: &NewLot) -> Result<InventoryLot, RepositoryError> {
        self.working.require_variant(input.variant_id)?;
        if input.quantity < 0 {
            return Err(RepositoryError::Conflict(
                "lot quantity cannot be negative".to_string(),
            ));
        }
        if let Some(item_id) = input.purchase_order_item_id
            && self
                .working
                .lots
                .values()
                .any(|lot| lot.purchase_order_item_id == Some(item_id))
        {
            return Err(RepositoryError::Conflict(
                "Purchase order item already has a lot".to_string(),
            ));
        }

        let id = InventoryLotId::new(self.working.next_id());
        let lot = InventoryLot {
            id,
            variant_id: input.variant_id,
            original_quantity: input.quantity,
            remaining_quantity: input.quantity,
            cost_source: input.cost_source,
            cost_usd: input.cost_usd,
            purchase_order_item_id: input.purchase_order_item_id,
            restocked_from_order_id: input.restocked_from_order_id,
            arrival_date: input.arrival_date,
            created_at: input.created_at,
        };
        self.working.lots.insert(id, lot.clone());
        Ok(lot)
    }

    async fn lock_available_lots(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError> {
        Ok(self.working.lots_of(variant_id, true))
    }

    async fn list_lots_with_origin(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError> {
        Ok(self.working.lots_of(variant_id, false))
    }

    async fn consume_from_lot(
        &mut self,
        lot_id: InventoryLotId,
        quantity: i32,
    ) -> Result<InventoryLot, RepositoryError> {
        let lot = self
            .working
            .lots
            .get_mut(&lot_id)
            .filter(|lot| lot.remaining_quantity >= quantity)
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "lot {lot_id} holds fewer than {quantity} units"
                ))
            })?;
        lot.remaining_quantity -= quantity;
        Ok(lot.clone())
    }

    async fn lot_for_purchase_order_item(
        &mut self,
        item_id: PurchaseOrderItemId,
    ) -> Result<Option<InventoryLot>, RepositoryError> {
        Ok(self
            .working
            .lots
            .values()
            .find(|lot| lot.purchase_order_item_id == Some(item_id))
            .cloned())
    }

    async fn resize_lot(
        &mut self,
        lot_id: InventoryLotId,
        original_quantity: i32,
        remaining_quantity: i32,
    ) -> Result<InventoryLot, RepositoryError> {
        if remaining_quantity < 0 || remaining_quantity > original_quantity {
            return Err(RepositoryError::Conflict(format!(
                "lot {lot_id} cannot hold {remaining_quantity} of {original_quantity}"
            )));
        }
        let lot = self
            .working
            .lots
            .get_mut(&lot_id)
            .ok_or(RepositoryError::NotFound)?;
        lot.original_quantity = original_quantity;
        lot.remaining_quantity = remaining_quantity;
        Ok(lot.clone())
    }

    async fn available_quantity(&mut self, variant_id: VariantId) -> Result<i64, RepositoryError> {
        Ok(self
            .working
            .lots
            .values()
            .filter(|lot| lot.variant_id == variant_id)
            .map(|lot| i64::from(lot.remaining_quantity))
            .sum())
    }
}

#[async_trait]
impl PurchaseOrderStore for MemoryLedgerTx {
    async fn insert_purchase_order(
        &mut self,
        input: &NewPurchaseOrder,
        created_at: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError> {
        if self
            .working
            .purchase_orders
            .values()
            .any(|order| order.batch_number == input.batch_number)
        {
            return Err(RepositoryError::Conflict(format!(
                "batch number {} already exists",
                input.batch_number
            )));
        }

        let id = PurchaseOrderId::new(self.working.next_id());
        let order = PurchaseOrder {
            id,
            batch_number: input.batch_number.clone(),
            arrival_date: input.arrival_date,
            has_arrived: false,
            total_cost_usd: None,
            usd_to_source_rate: input.usd_to_source_rate,
            created_at,
        };
        self.working.purchase_orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        Ok(self.working.purchase_orders.get(&id).cloned())
    }

    async fn list_purchase_orders(&mut self) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        let mut orders: Vec<PurchaseOrder> =
            self.working.purchase_orders.values().cloned().collect();
        orders.sort_by_key(|order| (order.created_at, order.id));
        Ok(orders)
    }

    async fn lock_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        Ok(self.working.purchase_orders.get(&id).cloned())
    }

    async fn mark_purchase_order_arrived(
        &mut self,
        id: PurchaseOrderId,
        arrival_date: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError> {
        let order = self
            .working
            .purchase_orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        order.has_arrived = true;
        order.arrival_date = Some(arrival_date);
        Ok(order.clone())
    }

    async fn set_purchase_order_total(
        &mut self,
        id: PurchaseOrderId,
        total_cost_usd: Option<Decimal>,
    ) -> Result<(), RepositoryError> {
        let order = self
            .working
            .purchase_orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        order.total_cost_usd = total_cost_usd;
        Ok(())
    }

    async fn insert_purchase_order_item(
        &mut self,
        purchase_order_id: PurchaseOrderId,
        input: &NewPurchaseOrderItem,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        self.working.require_variant(input.variant_id)?;
        if !self.working.purchase_orders.contains_key(&purchase_order_id) {
            return Err(RepositoryError::Conflict(format!(
                "purchase order {purchase_order_id} does not exist"
            )));
        }

        let id = PurchaseOrderItemId::new(self.working.next_id());
        let item = PurchaseOrderItem {
            id,
            purchase_order_id,
            variant_id: input.variant_id,
            quantity_ordered: input.quantity_ordered,
            cost_per_item_source: input.cost_per_item_source,
            cost_per_item_usd: input.cost_per_item_usd,
        };
        self.working.purchase_order_items.insert(id, item.clone());
        Ok(item)
    }

    async fn get_purchase_order_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> Result<Option<PurchaseOrderItem>, RepositoryError> {
        Ok(self.working.purchase_order_items.get(&id).cloned())
    }

    async fn list_purchase_order_items(
        &mut self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderItem>, RepositoryError> {
        Ok(self
            .working
            .purchase_order_items
            .values()
            .filter(|item| item.purchase_order_id == purchase_order_id)
            .cloned()
            .collect())
    }

    async fn set_purchase_order_item_quantity(
        &mut self,
        id: PurchaseOrderItemId,
        quantity_ordered: i32,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        let item = self
            .working
            .purchase_order_items
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        item.quantity_ordered = quantity_ordered;
        Ok(item.clone())
    }

    async fn set_purchase_order_item_cost(
        &mut self,
        id: PurchaseOrderItemId,
        cost_per_item_usd: Decimal,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        let item = self
            .working
            .purchase_order_items
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        item.cost_per_item_usd = Some(cost_per_item_usd);
        Ok(item.clone())
    }
}

#[async_trait]
impl CustomerOrderStore for MemoryLedgerTx {
    async fn insert_customer_order(
        &mut self,
        input: &NewCustomerOrder,
    ) -> Result<CustomerOrder, RepositoryError> {
        let id = CustomerOrderId::new(self.working.next_id());
        let order = CustomerOrder {
            id,
            customer_name: input.customer_name.clone(),
            order_date: input.order_date,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            money_holder: input.money_holder.clone(),
            payment_method: input.payment_method.clone(),
            status: CustomerOrderStatus::Active,
        };
        self.working.customer_orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError> {
        Ok(self.working.customer_orders.get(&id).cloned())
    }

    async fn list_customer_orders(&mut self) -> Result<Vec<CustomerOrder>, RepositoryError> {
        let mut orders: Vec<CustomerOrder> =
            self.working.customer_orders.values().cloned().collect();
        orders.sort_by_key(|order| std::cmp::Reverse((order.order_date, order.id)));
        Ok(orders)
    }

    async fn lock_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError> {
        Ok(self.working.customer_orders.get(&id).cloned())
    }

    async fn set_customer_order_status(
        &mut self,
        id: CustomerOrderId,
        status: CustomerOrderStatus,
    ) -> Result<CustomerOrder, RepositoryError> {
        let order = self
            .working
            .customer_orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        Ok(order.clone())
    }

    async fn update_customer_order_info(
        &mut self,
        id: CustomerOrderId,
        input: &UpdateCustomerOrderInput,
    ) -> Result<CustomerOrder, RepositoryError> {
        let order = self
            .working
            .customer_orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &input.customer_name {
            order.customer_name.clone_from(name);
        }
        if let Some(holder) = &input.money_holder {
            order.money_holder = Some(holder.clone());
        }
        if let Some(status) = input.fulfillment_status {
            order.fulfillment_status = status;
        }
        Ok(order.clone())
    }

    async fn insert_customer_order_item(
        &mut self,
        customer_order_id: CustomerOrderId,
        input: &NewCustomerOrderItem,
    ) -> Result<CustomerOrderItem, RepositoryError> {
        self.working.require_variant(input.variant_id)?;
        if !self.working.customer_orders.contains_key(&customer_order_id) {
            return Err(RepositoryError::Conflict(format!(
                "customer order {customer_order_id} does not exist"
            )));
        }

        let id = CustomerOrderItemId::new(self.working.next_id());
        let item = CustomerOrderItem {
            id,
            customer_order_id,
            variant_id: input.variant_id,
            quantity: input.quantity,
            sale_price: input.sale_price,
            cogs: None,
        };
        self.working.customer_order_items.insert(id, item.clone());
        Ok(item)
    }

    async fn list_customer_order_items(
        &mut self,
        customer_order_id: CustomerOrderId,
    ) -> Result<Vec<CustomerOrderItem>, RepositoryError> {
        Ok(self
            .working
            .customer_order_items
            .values()
            .filter(|item| item.customer_order_id == customer_order_id)
            .cloned()
            .collect())
    }

    async fn set_customer_order_item_cogs(
        &mut self,
        id: CustomerOrderItemId,
        cogs: Decimal,
    ) -> Result<CustomerOrderItem, RepositoryError> {
        let item = self
            .working
            .customer_order_items
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        item.cogs = Some(cogs);
        Ok(item.clone())
    }
}

#[async_trait]
impl StockChangeStore for MemoryLedgerTx {
    async fn insert_stock_change(
        &mut self,
        input: &NewStockChange,
    ) -> Result<StockChangeEntry, RepositoryError> {
        self.working.require_variant(input.variant_id)?;
        if input.change == 0 {
            return Err(RepositoryError::Conflict(
                "stock change must be non-zero".to_string(),
            ));
        }

        let entry = StockChangeEntry {
            id: StockChangeId::new(self.working.next_id()),
            variant_id: input.variant_id,
            change: input.change,
            change_time: input.change_time,
            reason: input.reason,
            actor: input.actor.clone(),
            order: input.order,
        };
        self.working.stock_changes.push(entry.clone());
        Ok(entry)
    }

    async fn list_stock_changes_for_variant(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError> {
        let mut entries: Vec<StockChangeEntry> = self
            .working
            .stock_changes
            .iter()
            .filter(|entry| entry.variant_id == variant_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.change_time, b.id).cmp(&(a.change_time, a.id)));
        Ok(entries)
    }

    async fn list_stock_changes_for_order(
        &mut self,
        order: OrderRef,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError> {
        let mut entries: Vec<StockChangeEntry> = self
            .working
            .stock_changes
            .iter()
            .filter(|entry| entry.order == order)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.change_time, entry.id));
        Ok(entries)
    }
}
