//! Inventory lot domain models for tracking units received at a known cost.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{CustomerOrderId, ExchangeRate, InventoryLotId, PurchaseOrderItemId, VariantId};

/// An inventory lot - units received at one cost point.
///
/// `remaining_quantity` only goes down (through fulfillment) except when a
/// received purchase-order line is resized. Consumed lots stay at zero and
/// are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    /// Unique lot ID.
    pub id: InventoryLotId,
    /// Variant the units belong to.
    pub variant_id: VariantId,
    /// Units received.
    pub original_quantity: i32,
    /// Units not yet sold, in `0..=original_quantity`.
    pub remaining_quantity: i32,
    /// Unit cost in the supplier's currency.
    pub cost_source: Option<Decimal>,
    /// Unit cost in USD. `None` means unknown, not free.
    pub cost_usd: Option<Decimal>,
    /// Purchase-order line this lot was received from.
    pub purchase_order_item_id: Option<PurchaseOrderItemId>,
    /// Customer order whose void created this lot.
    pub restocked_from_order_id: Option<CustomerOrderId>,
    /// When the units physically arrived.
    pub arrival_date: DateTime<Utc>,
    /// When the lot row was created (FIFO tie-break).
    pub created_at: DateTime<Utc>,
}

impl InventoryLot {
    /// Units already consumed from this lot.
    #[must_use]
    pub const fn consumed_quantity(&self) -> i32 {
        self.original_quantity - self.remaining_quantity
    }
}

/// A lot joined with what FIFO ordering and costing need from its
/// originating purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotWithOrigin {
    /// The lot itself.
    pub lot: InventoryLot,
    /// Arrival date of the originating purchase order, if any.
    pub order_arrival_date: Option<DateTime<Utc>>,
    /// Exchange rate of the originating purchase order, if any.
    pub order_exchange_rate: Option<ExchangeRate>,
}

/// Input for creating a new inventory lot.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub cost_source: Option<Decimal>,
    pub cost_usd: Option<Decimal>,
    pub purchase_order_item_id: Option<PurchaseOrderItemId>,
    pub restocked_from_order_id: Option<CustomerOrderId>,
    pub arrival_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
