//! Database operations for product variants.
//!
//! Catalog management lives outside the ledger; the ledger only reads
//! variants and can seed them.

use async_trait::async_trait;
use rust_decimal::Decimal;

use stockroom_core::VariantId;

use super::RepositoryError;
use super::postgres::PgLedgerTx;
use crate::models::variant::{NewVariant, ProductVariant};

/// Variant access inside a ledger transaction.
#[async_trait]
pub trait VariantStore: Send {
    /// Insert a variant.
    async fn insert_variant(&mut self, input: &NewVariant)
    -> Result<ProductVariant, RepositoryError>;

    /// Get a variant by ID.
    async fn get_variant(&mut self, id: VariantId)
    -> Result<Option<ProductVariant>, RepositoryError>;
}

/// Internal row type for variant queries.
#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    sku: String,
    color: String,
    size: Option<String>,
    sale_price: Decimal,
    legacy_sku: Option<String>,
    display_name: Option<String>,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            sku: row.sku,
            color: row.color,
            size: row.size,
            sale_price: row.sale_price,
            legacy_sku: row.legacy_sku,
            display_name: row.display_name,
        }
    }
}

#[async_trait]
impl VariantStore for PgLedgerTx {
    async fn insert_variant(
        &mut self,
        input: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let row = sqlx::query_as!(
            VariantRow,
            r#"
            INSERT INTO ledger.product_variant (
                sku, color, size, sale_price, legacy_sku, display_name
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sku, color, size, sale_price, legacy_sku, display_name
            "#,
            input.sku,
            input.color,
            input.size,
            input.sale_price,
            input.legacy_sku,
            input.display_name
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn get_variant(
        &mut self,
        id: VariantId,
    ) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as!(
            VariantRow,
            r#"
            SELECT id, sku, color, size, sale_price, legacy_sku, display_name
            FROM ledger.product_variant
            WHERE id = $1
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }
}
