//! Stock change audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    Actor, CustomerOrderId, OrderType, PurchaseOrderId, StockChangeId, StockChangeReason,
    VariantId,
};

/// The order a stock change is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderRef {
    Customer(CustomerOrderId),
    Purchase(PurchaseOrderId),
    Manual,
}

impl OrderRef {
    /// The stored order-type tag.
    #[must_use]
    pub const fn order_type(self) -> OrderType {
        match self {
            Self::Customer(_) => OrderType::Customer,
            Self::Purchase(_) => OrderType::Purchase,
            Self::Manual => OrderType::Manual,
        }
    }

    /// The stored order id column.
    #[must_use]
    pub const fn order_id(self) -> Option<i32> {
        match self {
            Self::Customer(id) => Some(id.as_i32()),
            Self::Purchase(id) => Some(id.as_i32()),
            Self::Manual => None,
        }
    }

    /// Rebuild from the stored columns.
    ///
    /// # Errors
    ///
    /// Returns a message if a customer or purchase tag has no id.
    pub fn from_columns(order_type: OrderType, order_id: Option<i32>) -> Result<Self, String> {
        match (order_type, order_id) {
            (OrderType::Customer, Some(id)) => Ok(Self::Customer(CustomerOrderId::new(id))),
            (OrderType::Purchase, Some(id)) => Ok(Self::Purchase(PurchaseOrderId::new(id))),
            (OrderType::Manual, _) => Ok(Self::Manual),
            (tag, None) => Err(format!("{tag} stock change without an order id")),
        }
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChangeEntry {
    pub id: StockChangeId,
    pub variant_id: VariantId,
    /// Signed quantity delta.
    pub change: i32,
    pub change_time: DateTime<Utc>,
    pub reason: StockChangeReason,
    pub actor: Actor,
    pub order: OrderRef,
}

/// Input for appending an audit row.
#[derive(Debug, Clone)]
pub struct NewStockChange {
    pub variant_id: VariantId,
    pub change: i32,
    pub change_time: DateTime<Utc>,
    pub reason: StockChangeReason,
    pub actor: Actor,
    pub order: OrderRef,
}
