//! Purchase order models: inbound stock from one supplier batch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{ExchangeRate, PurchaseOrderId, PurchaseOrderItemId, VariantId};

/// A batch of inbound stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    /// Human-assigned, unique.
    pub batch_number: String,
    pub arrival_date: Option<DateTime<Utc>>,
    /// Flips to `true` exactly once, on receipt.
    pub has_arrived: bool,
    /// Sum of line quantity times USD unit cost.
    pub total_cost_usd: Option<Decimal>,
    /// Source-currency units per USD.
    pub usd_to_source_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// The order's exchange rate, if it has a usable one.
    #[must_use]
    pub fn exchange_rate(&self) -> Option<ExchangeRate> {
        self.usd_to_source_rate.and_then(ExchangeRate::new)
    }
}

/// One line of a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: PurchaseOrderItemId,
    pub purchase_order_id: PurchaseOrderId,
    pub variant_id: VariantId,
    pub quantity_ordered: i32,
    pub cost_per_item_source: Option<Decimal>,
    pub cost_per_item_usd: Option<Decimal>,
}

impl PurchaseOrderItem {
    /// USD unit cost: the explicit USD cost, else the source cost converted
    /// through `rate`. Unrounded.
    #[must_use]
    pub fn unit_cost_usd(&self, rate: Option<ExchangeRate>) -> Option<Decimal> {
        self.cost_per_item_usd.or_else(|| {
            self.cost_per_item_source
                .zip(rate)
                .map(|(source, rate)| rate.to_usd(source))
        })
    }
}

/// A purchase order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderWithItems {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

/// Input for logging a new supplier batch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseOrder {
    pub batch_number: String,
    pub usd_to_source_rate: Option<Decimal>,
    /// Expected or known arrival date; receipt fills it in when absent.
    pub arrival_date: Option<DateTime<Utc>>,
}

/// Input for adding a line to a purchase order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub variant_id: VariantId,
    pub quantity_ordered: i32,
    pub cost_per_item_source: Option<Decimal>,
    pub cost_per_item_usd: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: Option<i64>, usd: Option<i64>) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: PurchaseOrderItemId::new(1),
            purchase_order_id: PurchaseOrderId::new(1),
            variant_id: VariantId::new(1),
            quantity_ordered: 10,
            cost_per_item_source: source.map(Decimal::from),
            cost_per_item_usd: usd.map(Decimal::from),
        }
    }

    #[test]
    fn test_unit_cost_prefers_explicit_usd() {
        let rate = ExchangeRate::new(Decimal::from(7));
        assert_eq!(item(Some(70), Some(3)).unit_cost_usd(rate), Some(Decimal::from(3)));
    }

    #[test]
    fn test_unit_cost_converts_source() {
        let rate = ExchangeRate::new(Decimal::from(7));
        assert_eq!(item(Some(70), None).unit_cost_usd(rate), Some(Decimal::from(10)));
    }

    #[test]
    fn test_unit_cost_unknown_without_rate() {
        assert_eq!(item(Some(70), None).unit_cost_usd(None), None);
        assert_eq!(item(None, None).unit_cost_usd(ExchangeRate::new(Decimal::ONE)), None);
    }
}
