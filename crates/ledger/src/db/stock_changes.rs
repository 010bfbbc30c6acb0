//! Database operations for the append-only stock change log.
//!
//! There is deliberately no update or delete here; the table also rejects
//! both with a trigger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{Actor, OrderType, StockChangeId, StockChangeReason, VariantId};

use super::postgres::PgLedgerTx;
use super::{RepositoryError, parse_column};
use crate::models::stock_change::{NewStockChange, OrderRef, StockChangeEntry};

/// Audit log access inside a ledger transaction.
#[async_trait]
pub trait StockChangeStore: Send {
    /// Append an entry.
    async fn insert_stock_change(
        &mut self,
        input: &NewStockChange,
    ) -> Result<StockChangeEntry, RepositoryError>;

    /// Entries for a variant, newest first.
    async fn list_stock_changes_for_variant(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError>;

    /// Entries attributed to an order, oldest first.
    async fn list_stock_changes_for_order(
        &mut self,
        order: OrderRef,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError>;
}

/// Internal row type for stock change queries.
#[derive(Debug, sqlx::FromRow)]
struct StockChangeRow {
    id: i32,
    variant_id: i32,
    change: i32,
    change_time: DateTime<Utc>,
    reason: String,
    actor: Actor,
    order_id: Option<i32>,
    order_type: String,
}

impl TryFrom<StockChangeRow> for StockChangeEntry {
    type Error = RepositoryError;

    fn try_from(row: StockChangeRow) -> Result<Self, Self::Error> {
        let order_type = parse_column::<OrderType>("stock_change.order_type", &row.order_type)?;
        let order = OrderRef::from_columns(order_type, row.order_id)
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: StockChangeId::new(row.id),
            variant_id: VariantId::new(row.variant_id),
            change: row.change,
            change_time: row.change_time,
            reason: parse_column::<StockChangeReason>("stock_change.reason", &row.reason)?,
            actor: row.actor,
            order,
        })
    }
}

#[async_trait]
impl StockChangeStore for PgLedgerTx {
    async fn insert_stock_change(
        &mut self,
        input: &NewStockChange,
    ) -> Result<StockChangeEntry, RepositoryError> {
        let row = sqlx::query_as!(
            StockChangeRow,
            r#"
            INSERT INTO ledger.stock_change (
                variant_id, change, change_time, reason, actor, order_id, order_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING
                id, variant_id, change, change_time, reason,
                actor AS "actor: Actor", order_id, order_type
            "#,
            input.variant_id.as_i32(),
            input.change,
            input.change_time,
            input.reason.as_str(),
            input.actor.as_str(),
            input.order.order_id(),
            input.order.order_type().as_str()
        )
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn list_stock_changes_for_variant(
        &mut self,
        variant_id: VariantId,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError> {
        let rows = sqlx::query_as!(
            StockChangeRow,
            r#"
            SELECT
                id, variant_id, change, change_time, reason,
                actor AS "actor: Actor", order_id, order_type
            FROM ledger.stock_change
            WHERE variant_id = $1
            ORDER BY change_time DESC, id DESC
            "#,
            variant_id.as_i32()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_stock_changes_for_order(
        &mut self,
        order: OrderRef,
    ) -> Result<Vec<StockChangeEntry>, RepositoryError> {
        let rows = sqlx::query_as!(
            StockChangeRow,
            r#"
            SELECT
                id, variant_id, change, change_time, reason,
                actor AS "actor: Actor", order_id, order_type
            FROM ledger.stock_change
            WHERE order_type = $1 AND order_id IS NOT DISTINCT FROM $2
            ORDER BY change_time ASC, id ASC
            "#,
            order.order_type().as_str(),
            order.order_id()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
