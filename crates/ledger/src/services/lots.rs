//! Inventory lot manager: creates the cost lots FIFO later consumes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockroom_core::{Actor, PurchaseOrderItemId, StockChangeReason, VariantId, round_currency};

use super::audit::StockAuditLog;
use super::fulfillment::{UnknownArrivalPolicy, sort_fifo};
use crate::clock::Clock;
use crate::db::{LedgerStore, LedgerTx, LotStore, PurchaseOrderStore, VariantStore};
use crate::error::LedgerError;
use crate::models::{InventoryLot, NewLot, NewStockChange, OrderRef};

/// Stock arriving against a purchase-order line.
#[derive(Debug, Clone)]
pub struct StockReceipt {
    pub variant_id: VariantId,
    pub quantity: i32,
    /// Unit cost in the supplier's currency.
    pub cost_source: Option<Decimal>,
    pub purchase_order_item_id: PurchaseOrderItemId,
    /// Defaults to now.
    pub arrival_date: Option<DateTime<Utc>>,
}

/// Stock added by hand, outside any purchase order.
#[derive(Debug, Clone)]
pub struct ManualLot {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub cost_source: Option<Decimal>,
    pub cost_usd: Option<Decimal>,
}

/// Creates lots and answers stock questions.
#[derive(Clone)]
pub struct InventoryLotManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: UnknownArrivalPolicy,
    audit: StockAuditLog<S>,
}

impl<S: LedgerStore> InventoryLotManager<S> {
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: UnknownArrivalPolicy) -> Self {
        Self {
            audit: StockAuditLog::new(store.clone()),
            store,
            clock,
            policy,
        }
    }

    /// Create one lot for received purchase-order stock.
    ///
    /// # Errors
    ///
    /// - `Validation` if the quantity is not positive or the variant is not
    ///   the one the purchase-order line orders
    /// - `NotFound` if the purchase-order line or its order does not exist
    /// - `Conflict` if the line already has a lot
    pub async fn receive_stock(&self, receipt: &StockReceipt) -> Result<InventoryLot, LedgerError> {
        let mut tx = self.store.begin().await?;
        let lot = self.receive_stock_in(&mut tx, receipt).await?;
        tx.commit().await?;
        Ok(lot)
    }

    /// [`Self::receive_stock`] inside the caller's transaction.
    ///
    /// The USD cost is the source cost converted through the order's rate and
    /// rounded to cents; without a rate the line's USD cost is used, and
    /// without either it stays unknown.
    ///
    /// Locks the parent purchase order, as every purchase-order write does.
    ///
    /// # Errors
    ///
    /// See [`Self::receive_stock`].
    #[instrument(
        skip_all,
        fields(variant_id = %receipt.variant_id, item_id = %receipt.purchase_order_item_id)
    )]
    pub async fn receive_stock_in(
        &self,
        tx: &mut S::Tx,
        receipt: &StockReceipt,
    ) -> Result<InventoryLot, LedgerError> {
        if receipt.quantity <= 0 {
            return Err(LedgerError::Validation(format!(
                "received quantity must be positive, got {}",
                receipt.quantity
            )));
        }

        let item = tx
            .get_purchase_order_item(receipt.purchase_order_item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::not_found("purchase order item", receipt.purchase_order_item_id)
            })?;
        if item.variant_id != receipt.variant_id {
            return Err(LedgerError::Validation(format!(
                "purchase order item {} is for variant {}, not {}",
                item.id, item.variant_id, receipt.variant_id
            )));
        }
        let order = tx
            .lock_purchase_order(item.purchase_order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("purchase order", item.purchase_order_id))?;

        let cost_usd = match (receipt.cost_source, order.exchange_rate()) {
            (Some(source), Some(rate)) => Some(round_currency(rate.to_usd(source))),
            _ => item.cost_per_item_usd,
        };

        let now = self.clock.now();
        let lot = tx
            .insert_lot(&NewLot {
                variant_id: receipt.variant_id,
                quantity: receipt.quantity,
                cost_source: receipt.cost_source,
                cost_usd,
                purchase_order_item_id: Some(receipt.purchase_order_item_id),
                restocked_from_order_id: None,
                arrival_date: receipt.arrival_date.unwrap_or(now),
                created_at: now,
            })
            .await?;

        info!(lot_id = %lot.id, quantity = lot.original_quantity, "Received stock");
        Ok(lot)
    }

    /// Add a lot by hand and record a manual audit entry.
    ///
    /// # Errors
    ///
    /// - `Validation` if the quantity is not positive or no cost is given
    /// - `NotFound` if the variant does not exist
    #[instrument(skip_all, fields(variant_id = %input.variant_id, actor = %actor))]
    pub async fn add_manual_lot(
        &self,
        input: &ManualLot,
        actor: &Actor,
    ) -> Result<InventoryLot, LedgerError> {
        if input.quantity <= 0 {
            return Err(LedgerError::Validation(format!(
                "quantity must be positive, got {}",
                input.quantity
            )));
        }
        if input.cost_source.is_none() && input.cost_usd.is_none() {
            return Err(LedgerError::Validation(
                "a manual lot needs a source or USD cost".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        if tx.get_variant(input.variant_id).await?.is_none() {
            return Err(LedgerError::not_found("variant", input.variant_id));
        }

        let now = self.clock.now();
        let lot = tx
            .insert_lot(&NewLot {
                variant_id: input.variant_id,
                quantity: input.quantity,
                cost_source: input.cost_source,
                cost_usd: input.cost_usd,
                purchase_order_item_id: None,
                restocked_from_order_id: None,
                arrival_date: now,
                created_at: now,
            })
            .await?;
        self.audit
            .record_in(
                &mut tx,
                &NewStockChange {
                    variant_id: input.variant_id,
                    change: input.quantity,
                    change_time: now,
                    reason: StockChangeReason::Manual,
                    actor: actor.clone(),
                    order: OrderRef::Manual,
                },
            )
            .await?;
        tx.commit().await?;

        info!(lot_id = %lot.id, quantity = input.quantity, "Added manual lot");
        Ok(lot)
    }

    /// Units available to sell: the sum of remaining quantities.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the variant does not exist.
    pub async fn available_stock(&self, variant_id: VariantId) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        if tx.get_variant(variant_id).await?.is_none() {
            return Err(LedgerError::not_found("variant", variant_id));
        }
        let available = tx.available_quantity(variant_id).await?;
        tx.commit().await?;
        Ok(available)
    }

    /// Every lot of a variant, consumed ones included, in FIFO order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the variant does not exist.
    pub async fn list_lots(&self, variant_id: VariantId) -> Result<Vec<InventoryLot>, LedgerError> {
        let mut tx = self.store.begin().await?;
        if tx.get_variant(variant_id).await?.is_none() {
            return Err(LedgerError::not_found("variant", variant_id));
        }
        let mut lots = tx.list_lots_with_origin(variant_id).await?;
        tx.commit().await?;

        sort_fifo(&mut lots, self.policy);
        Ok(lots.into_iter().map(|l| l.lot).collect())
    }
}
