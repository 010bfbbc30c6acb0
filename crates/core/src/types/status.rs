//! Status and tag enums for ledger entities.
//!
//! All of these are persisted as `TEXT`; `Display` writes the stored form and
//! `FromStr` parses it back.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a customer order.
///
/// `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerOrderStatus {
    #[default]
    Active,
    Cancelled,
}

impl CustomerOrderStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for CustomerOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CustomerOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("invalid customer order status: {s}")),
        }
    }
}

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
}

impl FulfillmentStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unfulfilled => "UNFULFILLED",
            Self::PartiallyFulfilled => "PARTIALLY_FULFILLED",
            Self::Fulfilled => "FULFILLED",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNFULFILLED" => Ok(Self::Unfulfilled),
            "PARTIALLY_FULFILLED" => Ok(Self::PartiallyFulfilled),
            "FULFILLED" => Ok(Self::Fulfilled),
            _ => Err(format!("invalid fulfillment status: {s}")),
        }
    }
}

/// Why a stock change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockChangeReason {
    /// Units left stock through a customer order.
    #[serde(rename = "Sale")]
    Sale,
    /// Units arrived on a purchase order.
    #[serde(rename = "Purchase Order Received")]
    PurchaseOrderReceived,
    /// Units came back when a sale was voided.
    #[serde(rename = "Void Sale")]
    VoidSale,
    /// Operator adjustment outside the order flows.
    #[serde(rename = "Manual")]
    Manual,
}

impl StockChangeReason {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "Sale",
            Self::PurchaseOrderReceived => "Purchase Order Received",
            Self::VoidSale => "Void Sale",
            Self::Manual => "Manual",
        }
    }
}

impl std::fmt::Display for StockChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockChangeReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sale" => Ok(Self::Sale),
            "Purchase Order Received" => Ok(Self::PurchaseOrderReceived),
            "Void Sale" => Ok(Self::VoidSale),
            "Manual" => Ok(Self::Manual),
            _ => Err(format!("invalid stock change reason: {s}")),
        }
    }
}

/// Which kind of order a stock change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Customer,
    Purchase,
    Manual,
}

impl OrderType {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Purchase => "PURCHASE",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Self::Customer),
            "PURCHASE" => Ok(Self::Purchase),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(format!("invalid order type: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_roundtrip() {
        for reason in [
            StockChangeReason::Sale,
            StockChangeReason::PurchaseOrderReceived,
            StockChangeReason::VoidSale,
            StockChangeReason::Manual,
        ] {
            assert_eq!(reason.to_string().parse::<StockChangeReason>().unwrap(), reason);
        }
    }

    #[test]
    fn test_reason_serde_matches_stored_form() {
        let json = serde_json::to_string(&StockChangeReason::PurchaseOrderReceived).unwrap();
        assert_eq!(json, "\"Purchase Order Received\"");
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("VOIDED".parse::<CustomerOrderStatus>().is_err());
        assert!("".parse::<OrderType>().is_err());
        assert!("shipped".parse::<FulfillmentStatus>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(CustomerOrderStatus::default(), CustomerOrderStatus::Active);
        assert_eq!(FulfillmentStatus::default(), FulfillmentStatus::Unfulfilled);
    }
}
