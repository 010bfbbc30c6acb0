//! Product variant model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockroom_core::VariantId;

/// A sellable SKU.
///
/// There is no stock counter here: available stock is the sum of remaining
/// quantities across the variant's lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub sku: String,
    pub color: String,
    pub size: Option<String>,
    pub sale_price: Decimal,
    /// SKU from the system this catalog was imported from.
    pub legacy_sku: Option<String>,
    /// Product name shown to operators.
    pub display_name: Option<String>,
}

impl ProductVariant {
    /// Human-readable label used in error messages, e.g.
    /// `Linen Shirt (Blue, M) - SKU: LS-01`.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.display_name.as_deref().unwrap_or(&self.sku);
        match self.size.as_deref() {
            Some(size) if !size.is_empty() => {
                format!("{name} ({}, {size}) - SKU: {}", self.color, self.sku)
            }
            _ => format!("{name} ({}) - SKU: {}", self.color, self.sku),
        }
    }
}

/// Input for seeding a variant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVariant {
    pub sku: String,
    pub color: String,
    pub size: Option<String>,
    pub sale_price: Decimal,
    pub legacy_sku: Option<String>,
    pub display_name: Option<String>,
}
