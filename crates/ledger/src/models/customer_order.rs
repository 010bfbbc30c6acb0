//! Customer order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{
    CustomerOrderId, CustomerOrderItemId, CustomerOrderStatus, FulfillmentStatus, VariantId,
};

/// Customer name recorded when none is supplied.
pub const GUEST_CUSTOMER: &str = "Guest";

/// A sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub id: CustomerOrderId,
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    pub fulfillment_status: FulfillmentStatus,
    /// Who is holding the cash for this sale.
    pub money_holder: Option<String>,
    pub payment_method: Option<String>,
    pub status: CustomerOrderStatus,
}

/// One sold line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderItem {
    pub id: CustomerOrderItemId,
    pub customer_order_id: CustomerOrderId,
    pub variant_id: VariantId,
    pub quantity: i32,
    pub sale_price: Decimal,
    /// USD cost of goods sold; `None` until fulfillment has run.
    pub cogs: Option<Decimal>,
}

/// A customer order with its lines, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderWithItems {
    pub order: CustomerOrder,
    pub items: Vec<CustomerOrderItem>,
}

/// Who bought.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
}

impl CustomerInfo {
    /// The name to record, `Guest` when blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(GUEST_CUSTOMER)
            .to_string()
    }
}

/// Payment metadata carried on the order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMeta {
    pub money_holder: Option<String>,
    pub payment_method: Option<String>,
}

/// One requested line of a new order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub sale_price: Decimal,
}

/// Insert shape for a customer order row.
#[derive(Debug, Clone)]
pub struct NewCustomerOrder {
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    pub money_holder: Option<String>,
    pub payment_method: Option<String>,
}

/// Insert shape for a customer order line.
#[derive(Debug, Clone)]
pub struct NewCustomerOrderItem {
    pub variant_id: VariantId,
    pub quantity: i32,
    pub sale_price: Decimal,
}

/// Editable order metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCustomerOrderInput {
    pub customer_name: Option<String>,
    pub money_holder: Option<String>,
    pub fulfillment_status: Option<FulfillmentStatus>,
}

impl UpdateCustomerOrderInput {
    /// Whether any field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.money_holder.is_none()
            && self.fulfillment_status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_display_name_defaults_to_guest() {
        assert_eq!(CustomerInfo::default().display_name(), "Guest");
        assert_eq!(
            CustomerInfo {
                name: Some("  ".to_string())
            }
            .display_name(),
            "Guest"
        );
        assert_eq!(
            CustomerInfo {
                name: Some(" Ana ".to_string())
            }
            .display_name(),
            "Ana"
        );
    }

    #[test]
    fn test_update_input_is_empty() {
        assert!(UpdateCustomerOrderInput::default().is_empty());
        let input = UpdateCustomerOrderInput {
            fulfillment_status: Some(FulfillmentStatus::Fulfilled),
            ..Default::default()
        };
        assert!(!input.is_empty());
    }
}
