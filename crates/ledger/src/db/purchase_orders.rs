//! Database operations for purchase orders and their lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{PurchaseOrderId, PurchaseOrderItemId, VariantId};

use super::postgres::PgLedgerTx;
use super::{RepositoryError, map_constraint};
use crate::models::purchase_order::{
    NewPurchaseOrder, NewPurchaseOrderItem, PurchaseOrder, PurchaseOrderItem,
};

/// Purchase order access inside a ledger transaction.
#[async_trait]
pub trait PurchaseOrderStore: Send {
    /// Insert a purchase order.
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate batch number.
    async fn insert_purchase_order(
        &mut self,
        input: &NewPurchaseOrder,
        created_at: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError>;

    /// Get a purchase order by ID.
    async fn get_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError>;

    /// Every purchase order, oldest first.
    async fn list_purchase_orders(&mut self) -> Result<Vec<PurchaseOrder>, RepositoryError>;

    /// Get a purchase order by ID and lock it for the rest of the transaction.
    async fn lock_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError>;

    /// Mark an order as arrived on `arrival_date`.
    async fn mark_purchase_order_arrived(
        &mut self,
        id: PurchaseOrderId,
        arrival_date: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError>;

    /// Store the computed USD total.
    async fn set_purchase_order_total(
        &mut self,
        id: PurchaseOrderId,
        total_cost_usd: Option<Decimal>,
    ) -> Result<(), RepositoryError>;

    /// Insert a line.
    async fn insert_purchase_order_item(
        &mut self,
        purchase_order_id: PurchaseOrderId,
        input: &NewPurchaseOrderItem,
    ) -> Result<PurchaseOrderItem, RepositoryError>;

    /// Get a line by ID.
    ///
    /// Does not lock the line. Writers lock the parent order first, so lock
    /// the order before relying on the line staying unchanged.
    async fn get_purchase_order_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> Result<Option<PurchaseOrderItem>, RepositoryError>;

    /// Lines of an order, in insertion order.
    async fn list_purchase_order_items(
        &mut self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderItem>, RepositoryError>;

    /// Change a line's ordered quantity.
    async fn set_purchase_order_item_quantity(
        &mut self,
        id: PurchaseOrderItemId,
        quantity_ordered: i32,
    ) -> Result<PurchaseOrderItem, RepositoryError>;

    /// Change a line's USD unit cost.
    async fn set_purchase_order_item_cost(
        &mut self,
        id: PurchaseOrderItemId,
        cost_per_item_usd: Decimal,
    ) -> Result<PurchaseOrderItem, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for purchase order queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: i32,
    batch_number: String,
    arrival_date: Option<DateTime<Utc>>,
    has_arrived: bool,
    total_cost_usd: Option<Decimal>,
    usd_to_source_rate: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<PurchaseOrderRow> for PurchaseOrder {
    fn from(row: PurchaseOrderRow) -> Self {
        Self {
            id: PurchaseOrderId::new(row.id),
            batch_number: row.batch_number,
            arrival_date: row.arrival_date,
            has_arrived: row.has_arrived,
            total_cost_usd: row.total_cost_usd,
            usd_to_source_rate: row.usd_to_source_rate,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for purchase order item queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderItemRow {
    id: i32,
    purchase_order_id: i32,
    variant_id: i32,
    quantity_ordered: i32,
    cost_per_item_source: Option<Decimal>,
    cost_per_item_usd: Option<Decimal>,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        Self {
            id: PurchaseOrderItemId::new(row.id),
            purchase_order_id: PurchaseOrderId::new(row.purchase_order_id),
            variant_id: VariantId::new(row.variant_id),
            quantity_ordered: row.quantity_ordered,
            cost_per_item_source: row.cost_per_item_source,
            cost_per_item_usd: row.cost_per_item_usd,
        }
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[async_trait]
impl PurchaseOrderStore for PgLedgerTx {
    async fn insert_purchase_order(
        &mut self,
        input: &NewPurchaseOrder,
        created_at: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderRow,
            r#"
            INSERT INTO ledger.purchase_order (
                batch_number, arrival_date, usd_to_source_rate, created_at
            )
            VALUES ($1, $2, $3, $4)
            RETURNING
                id, batch_number, arrival_date, has_arrived,
                total_cost_usd, usd_to_source_rate, created_at
            "#,
            input.batch_number,
            input.arrival_date,
            input.usd_to_source_rate,
            created_at
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            map_constraint(e, "purchase_order_batch_number_key", || {
                format!("batch number {} already exists", input.batch_number)
            })
        })?;

        Ok(row.into())
    }

    async fn get_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderRow,
            r#"
            SELECT
                id, batch_number, arrival_date, has_arrived,
                total_cost_usd, usd_to_source_rate, created_at
            FROM ledger.purchase_order
            WHERE id = $1
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_purchase_orders(&mut self) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        let rows = sqlx::query_as!(
            PurchaseOrderRow,
            r#"
            SELECT
                id, batch_number, arrival_date, has_arrived,
                total_cost_usd, usd_to_source_rate, created_at
            FROM ledger.purchase_order
            ORDER BY created_at ASC, id ASC
            "#
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn lock_purchase_order(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderRow,
            r#"
            SELECT
                id, batch_number, arrival_date, has_arrived,
                total_cost_usd, usd_to_source_rate, created_at
            FROM ledger.purchase_order
            WHERE id = $1
            FOR UPDATE
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_purchase_order_arrived(
        &mut self,
        id: PurchaseOrderId,
        arrival_date: DateTime<Utc>,
    ) -> Result<PurchaseOrder, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderRow,
            r#"
            UPDATE ledger.purchase_order
            SET has_arrived = true, arrival_date = $2
            WHERE id = $1
            RETURNING
                id, batch_number, arrival_date, has_arrived,
                total_cost_usd, usd_to_source_rate, created_at
            "#,
            id.as_i32(),
            arrival_date
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn set_purchase_order_total(
        &mut self,
        id: PurchaseOrderId,
        total_cost_usd: Option<Decimal>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query!(
            r#"
            UPDATE ledger.purchase_order
            SET total_cost_usd = $2
            WHERE id = $1
            "#,
            id.as_i32(),
            total_cost_usd
        )
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn insert_purchase_order_item(
        &mut self,
        purchase_order_id: PurchaseOrderId,
        input: &NewPurchaseOrderItem,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderItemRow,
            r#"
            INSERT INTO ledger.purchase_order_item (
                purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING
                id, purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            "#,
            purchase_order_id.as_i32(),
            input.variant_id.as_i32(),
            input.quantity_ordered,
            input.cost_per_item_source,
            input.cost_per_item_usd
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn get_purchase_order_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> Result<Option<PurchaseOrderItem>, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderItemRow,
            r#"
            SELECT
                id, purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            FROM ledger.purchase_order_item
            WHERE id = $1
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_purchase_order_items(
        &mut self,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<Vec<PurchaseOrderItem>, RepositoryError> {
        let rows = sqlx::query_as!(
            PurchaseOrderItemRow,
            r#"
            SELECT
                id, purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            FROM ledger.purchase_order_item
            WHERE purchase_order_id = $1
            ORDER BY id ASC
            "#,
            purchase_order_id.as_i32()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_purchase_order_item_quantity(
        &mut self,
        id: PurchaseOrderItemId,
        quantity_ordered: i32,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderItemRow,
            r#"
            UPDATE ledger.purchase_order_item
            SET quantity_ordered = $2
            WHERE id = $1
            RETURNING
                id, purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            "#,
            id.as_i32(),
            quantity_ordered
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn set_purchase_order_item_cost(
        &mut self,
        id: PurchaseOrderItemId,
        cost_per_item_usd: Decimal,
    ) -> Result<PurchaseOrderItem, RepositoryError> {
        let row = sqlx::query_as!(
            PurchaseOrderItemRow,
            r#"
            UPDATE ledger.purchase_order_item
            SET cost_per_item_usd = $2
            WHERE id = $1
            RETURNING
                id, purchase_order_id, variant_id, quantity_ordered,
                cost_per_item_source, cost_per_item_usd
            "#,
            id.as_i32(),
            cost_per_item_usd
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
