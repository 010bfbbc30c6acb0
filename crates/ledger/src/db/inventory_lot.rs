//! Database operations for inventory lots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{
    CustomerOrderId, ExchangeRate, InventoryLotId, PurchaseOrderItemId, VariantId,
};

use super::postgres::PgLedgerTx;
use super::{RepositoryError, map_constraint};
use crate::models::inventory_lot::{InventoryLot, LotWithOrigin, NewLot};

/// Lot access inside a ledger transaction.
#[async_trait]
pub trait LotStore: Send {
    /// Insert a lot with `remaining = original = input.quantity`.
    ///
    /// Returns `RepositoryError::Conflict` if the purchase-order item
    /// already has a lot.
    async fn insert_lot(&mut self, input: &NewLot) -> Result<InventoryLot, RepositoryError>;

    /// Lots of a variant that still hold stock, joined with their origin,
    /// locked against concurrent consumption until the transaction ends.
    async fn lock_available_lots(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError>;

    /// Every lot of a variant, consumed ones included, joined with origin.
    async fn list_lots_with_origin(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError>;

    /// Take `quantity` units out of a lot.
    ///
    /// Returns `RepositoryError::Conflict` if the lot holds fewer units.
    async fn consume_from_lot(
        &mut self,
        lot_id: InventoryLotId,
        quantity: i32,
    ) -> Result<InventoryLot, RepositoryError>;

    /// The lot received from a purchase-order line, locked.
    async fn lot_for_purchase_order_item(
        &mut self,
        item_id: PurchaseOrderItemId,
    ) -> Result<Option<InventoryLot>, RepositoryError>;

    /// Overwrite a lot's quantities.
    async fn resize_lot(
        &mut self,
        lot_id: InventoryLotId,
        original_quantity: i32,
        remaining_quantity: i32,
    ) -> Result<InventoryLot, RepositoryError>;

    /// Sum of remaining quantities across a variant's lots.
    async fn available_quantity(&mut self, variant_id: VariantId) -> Result<i64, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for inventory lot queries.
#[derive(Debug, sqlx::FromRow)]
struct InventoryLotRow {
    id: i32,
    variant_id: i32,
    original_quantity: i32,
    remaining_quantity: i32,
    cost_source: Option<Decimal>,
    cost_usd: Option<Decimal>,
    purchase_order_item_id: Option<i32>,
    restocked_from_order_id: Option<i32>,
    arrival_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<InventoryLotRow> for InventoryLot {
    fn from(row: InventoryLotRow) -> Self {
        Self {
            id: InventoryLotId::new(row.id),
            variant_id: VariantId::new(row.variant_id),
            original_quantity: row.original_quantity,
            remaining_quantity: row.remaining_quantity,
            cost_source: row.cost_source,
            cost_usd: row.cost_usd,
            purchase_order_item_id: row.purchase_order_item_id.map(PurchaseOrderItemId::new),
            restocked_from_order_id: row.restocked_from_order_id.map(CustomerOrderId::new),
            arrival_date: row.arrival_date,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for a lot joined with its purchase order.
#[derive(Debug, sqlx::FromRow)]
struct LotWithOriginRow {
    id: i32,
    variant_id: i32,
    original_quantity: i32,
    remaining_quantity: i32,
    cost_source: Option<Decimal>,
    cost_usd: Option<Decimal>,
    purchase_order_item_id: Option<i32>,
    restocked_from_order_id: Option<i32>,
    arrival_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    order_arrival_date: Option<DateTime<Utc>>,
    order_rate: Option<Decimal>,
}

impl From<LotWithOriginRow> for LotWithOrigin {
    fn from(row: LotWithOriginRow) -> Self {
        let lot = InventoryLotRow {
            id: row.id,
            variant_id: row.variant_id,
            original_quantity: row.original_quantity,
            remaining_quantity: row.remaining_quantity,
            cost_source: row.cost_source,
            cost_usd: row.cost_usd,
            purchase_order_item_id: row.purchase_order_item_id,
            restocked_from_order_id: row.restocked_from_order_id,
            arrival_date: row.arrival_date,
            created_at: row.created_at,
        };
        Self {
            lot: lot.into(),
            order_arrival_date: row.order_arrival_date,
            order_exchange_rate: row.order_rate.and_then(ExchangeRate::new),
        }
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[async_trait]
impl LotStore for PgLedgerTx {
    async fn insert_lot(&mut self, input: &NewLot) -> Result<InventoryLot, RepositoryError> {
        let row = sqlx::query_as!(
            InventoryLotRow,
            r#"
            INSERT INTO ledger.inventory_lot (
                variant_id, original_quantity, remaining_quantity,
                cost_source, cost_usd, purchase_order_item_id,
                restocked_from_order_id, arrival_date, created_at
            )
            VALUES ($1, $2, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, variant_id, original_quantity, remaining_quantity,
                cost_source, cost_usd, purchase_order_item_id,
                restocked_from_order_id, arrival_date, created_at
            "#,
            input.variant_id.as_i32(),
            input.quantity,
            input.cost_source,
            input.cost_usd,
            input.purchase_order_item_id.map(|id| id.as_i32()),
            input.restocked_from_order_id.map(|id| id.as_i32()),
            input.arrival_date,
            input.created_at
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            map_constraint(e, "inventory_lot_purchase_order_item_key", || {
                "Purchase order item already has a lot".to_string()
            })
        })?;

        Ok(row.into())
    }

    async fn lock_available_lots(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError> {
        let rows = sqlx::query_as!(
            LotWithOriginRow,
            r#"
            SELECT
                l.id, l.variant_id, l.original_quantity, l.remaining_quantity,
                l.cost_source, l.cost_usd, l.purchase_order_item_id,
                l.restocked_from_order_id, l.arrival_date, l.created_at,
                po.arrival_date AS order_arrival_date,
                po.usd_to_source_rate AS order_rate
            FROM ledger.inventory_lot l
            LEFT JOIN ledger.purchase_order_item poi ON poi.id = l.purchase_order_item_id
            LEFT JOIN ledger.purchase_order po ON po.id = poi.purchase_order_id
            WHERE l.variant_id = $1 AND l.remaining_quantity > 0
            ORDER BY l.created_at ASC, l.id ASC
            FOR UPDATE OF l
            "#,
            variant_id.as_i32()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_lots_with_origin(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<LotWithOrigin>, RepositoryError> {
        let rows = sqlx::query_as!(
            LotWithOriginRow,
            r#"
            SELECT
                l.id, l.variant_id, l.original_quantity, l.remaining_quantity,
                l.cost_source, l.cost_usd, l.purchase_order_item_id,
                l.restocked_from_order_id, l.arrival_date, l.created_at,
                po.arrival_date AS order_arrival_date,
                po.usd_to_source_rate AS order_rate
            FROM ledger.inventory_lot l
            LEFT JOIN ledger.purchase_order_item poi ON poi.id = l.purchase_order_item_id
            LEFT JOIN ledger.purchase_order po ON po.id = poi.purchase_order_id
            WHERE l.variant_id = $1
            ORDER BY l.created_at ASC, l.id ASC
            "#,
            variant_id.as_i32()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn consume_from_lot(
        &mut self,
        lot_id: InventoryLotId,
        quantity: i32,
    ) -> Result<InventoryLot, RepositoryError> {
        let row = sqlx::query_as!(
            InventoryLotRow,
            r#"
            UPDATE ledger.inventory_lot
            SET remaining_quantity = remaining_quantity - $2
            WHERE id = $1 AND remaining_quantity >= $2
            RETURNING
                id, variant_id, original_quantity, remaining_quantity,
                cost_source, cost_usd, purchase_order_item_id,
                restocked_from_order_id, arrival_date, created_at
            "#,
            lot_id.as_i32(),
            quantity
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::Conflict(format!("lot {lot_id} holds fewer than {quantity} units"))
        })?;

        Ok(row.into())
    }

    async fn lot_for_purchase_order_item(
        &mut self,
        item_id: PurchaseOrderItemId,
    ) -> Result<Option<InventoryLot>, RepositoryError> {
        let row = sqlx::query_as!(
            InventoryLotRow,
            r#"
            SELECT
                id, variant_id, original_quantity, remaining_quantity,
                cost_source, cost_usd, purchase_order_item_id,
                restocked_from_order_id, arrival_date, created_at
            FROM ledger.inventory_lot
            WHERE purchase_order_item_id = $1
            FOR UPDATE
            "#,
            item_id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn resize_lot(
        &mut self,
        lot_id: InventoryLotId,
        original_quantity: i32,
        remaining_quantity: i32,
    ) -> Result<InventoryLot, RepositoryError> {
        let row = sqlx::query_as!(
            InventoryLotRow,
            r#"
            UPDATE ledger.inventory_lot
            SET original_quantity = $2, remaining_quantity = $3
            WHERE id = $1
            RETURNING
                id, variant_id, original_quantity, remaining_quantity,
                cost_source, cost_usd, purchase_order_item_id,
                restocked_from_order_id, arrival_date, created_at
            "#,
            lot_id.as_i32(),
            original_quantity,
            remaining_quantity
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            map_constraint(e, "inventory_lot_remaining_in_range", || {
                format!("lot {lot_id} cannot hold {remaining_quantity} of {original_quantity}")
            })
        })?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn available_quantity(&mut self, variant_id: VariantId) -> Result<i64, RepositoryError> {
        let total = sqlx::query_scalar!(
            r#"
            SELECT COALESCE(SUM(remaining_quantity), 0)::bigint AS "total!"
            FROM ledger.inventory_lot
            WHERE variant_id = $1
            "#,
            variant_id.as_i32()
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(total)
    }
}
