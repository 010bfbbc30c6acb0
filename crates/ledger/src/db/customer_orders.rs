//! Database operations for customer orders and their lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_core::{
    CustomerOrderId, CustomerOrderItemId, CustomerOrderStatus, FulfillmentStatus, VariantId,
};

use super::postgres::PgLedgerTx;
use super::{RepositoryError, parse_column};
use crate::models::customer_order::{
    CustomerOrder, CustomerOrderItem, NewCustomerOrder, NewCustomerOrderItem,
    UpdateCustomerOrderInput,
};

/// Customer order access inside a ledger transaction.
#[async_trait]
pub trait CustomerOrderStore: Send {
    /// Insert an order with status `ACTIVE` and fulfillment `UNFULFILLED`.
    async fn insert_customer_order(
        &mut self,
        input: &NewCustomerOrder,
    ) -> Result<CustomerOrder, RepositoryError>;

    /// Get an order by ID.
    async fn get_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError>;

    /// Every order, newest first.
    async fn list_customer_orders(&mut self) -> Result<Vec<CustomerOrder>, RepositoryError>;

    /// Get an order by ID and lock it for the rest of the transaction.
    async fn lock_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError>;

    /// Change an order's lifecycle status.
    async fn set_customer_order_status(
        &mut self,
        id: CustomerOrderId,
        status: CustomerOrderStatus,
    ) -> Result<CustomerOrder, RepositoryError>;

    /// Apply the set fields of `input`.
    async fn update_customer_order_info(
        &mut self,
        id: CustomerOrderId,
        input: &UpdateCustomerOrderInput,
    ) -> Result<CustomerOrder, RepositoryError>;

    /// Insert a line with no COGS.
    async fn insert_customer_order_item(
        &mut self,
        customer_order_id: CustomerOrderId,
        input: &NewCustomerOrderItem,
    ) -> Result<CustomerOrderItem, RepositoryError>;

    /// Lines of an order, in submission order.
    async fn list_customer_order_items(
        &mut self,
        customer_order_id: CustomerOrderId,
    ) -> Result<Vec<CustomerOrderItem>, RepositoryError>;

    /// Record the computed COGS on a line.
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    async fn set_customer_order_item_cogs(
        &mut self,
        id: CustomerOrderItemId,
        cogs: Decimal,
    ) -> Result<CustomerOrderItem, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for customer order queries.
#[derive(Debug, sqlx::FromRow)]
struct CustomerOrderRow {
    id: i32,
    customer_name: String,
    order_date: DateTime<Utc>,
    fulfillment_status: String,
    money_holder: Option<String>,
    payment_method: Option<String>,
    status: String,
}

impl TryFrom<CustomerOrderRow> for CustomerOrder {
    type Error = RepositoryError;

    fn try_from(row: CustomerOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CustomerOrderId::new(row.id),
            customer_name: row.customer_name,
            order_date: row.order_date,
            fulfillment_status: parse_column::<FulfillmentStatus>(
                "customer_order.fulfillment_status",
                &row.fulfillment_status,
            )?,
            money_holder: row.money_holder,
            payment_method: row.payment_method,
            status: parse_column::<CustomerOrderStatus>("customer_order.status", &row.status)?,
        })
    }
}

/// Internal row type for customer order item queries.
#[derive(Debug, sqlx::FromRow)]
struct CustomerOrderItemRow {
    id: i32,
    customer_order_id: i32,
    variant_id: i32,
    quantity: i32,
    sale_price: Decimal,
    cogs: Option<Decimal>,
}

impl From<CustomerOrderItemRow> for CustomerOrderItem {
    fn from(row: CustomerOrderItemRow) -> Self {
        Self {
            id: CustomerOrderItemId::new(row.id),
            customer_order_id: CustomerOrderId::new(row.customer_order_id),
            variant_id: VariantId::new(row.variant_id),
            quantity: row.quantity,
            sale_price: row.sale_price,
            cogs: row.cogs,
        }
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[async_trait]
impl CustomerOrderStore for PgLedgerTx {
    async fn insert_customer_order(
        &mut self,
        input: &NewCustomerOrder,
    ) -> Result<CustomerOrder, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            INSERT INTO ledger.customer_order (
                customer_name, order_date, money_holder, payment_method,
                fulfillment_status, status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            "#,
            input.customer_name,
            input.order_date,
            input.money_holder,
            input.payment_method,
            FulfillmentStatus::Unfulfilled.as_str(),
            CustomerOrderStatus::Active.as_str()
        )
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn get_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            SELECT
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            FROM ledger.customer_order
            WHERE id = $1
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_customer_orders(&mut self) -> Result<Vec<CustomerOrder>, RepositoryError> {
        let rows = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            SELECT
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            FROM ledger.customer_order
            ORDER BY order_date DESC, id DESC
            "#
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn lock_customer_order(
        &mut self,
        id: CustomerOrderId,
    ) -> Result<Option<CustomerOrder>, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            SELECT
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            FROM ledger.customer_order
            WHERE id = $1
            FOR UPDATE
            "#,
            id.as_i32()
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_customer_order_status(
        &mut self,
        id: CustomerOrderId,
        status: CustomerOrderStatus,
    ) -> Result<CustomerOrder, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            UPDATE ledger.customer_order
            SET status = $2
            WHERE id = $1
            RETURNING
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            "#,
            id.as_i32(),
            status.as_str()
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn update_customer_order_info(
        &mut self,
        id: CustomerOrderId,
        input: &UpdateCustomerOrderInput,
    ) -> Result<CustomerOrder, RepositoryError> {
        let fulfillment_status = input
            .fulfillment_status
            .map(|status| status.as_str().to_owned());
        let row = sqlx::query_as!(
            CustomerOrderRow,
            r#"
            UPDATE ledger.customer_order
            SET
                customer_name = COALESCE($2, customer_name),
                money_holder = COALESCE($3, money_holder),
                fulfillment_status = COALESCE($4, fulfillment_status)
            WHERE id = $1
            RETURNING
                id, customer_name, order_date, fulfillment_status,
                money_holder, payment_method, status
            "#,
            id.as_i32(),
            input.customer_name,
            input.money_holder,
            fulfillment_status
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn insert_customer_order_item(
        &mut self,
        customer_order_id: CustomerOrderId,
        input: &NewCustomerOrderItem,
    ) -> Result<CustomerOrderItem, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderItemRow,
            r#"
            INSERT INTO ledger.customer_order_item (
                customer_order_id, variant_id, quantity, sale_price
            )
            VALUES ($1, $2, $3, $4)
            RETURNING id, customer_order_id, variant_id, quantity, sale_price, cogs
            "#,
            customer_order_id.as_i32(),
            input.variant_id.as_i32(),
            input.quantity,
            input.sale_price
        )
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn list_customer_order_items(
        &mut self,
        customer_order_id: CustomerOrderId,
    ) -> Result<Vec<CustomerOrderItem>, RepositoryError> {
        let rows = sqlx::query_as!(
            CustomerOrderItemRow,
            r#"
            SELECT id, customer_order_id, variant_id, quantity, sale_price, cogs
            FROM ledger.customer_order_item
            WHERE customer_order_id = $1
            ORDER BY id ASC
            "#,
            customer_order_id.as_i32()
        )
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_customer_order_item_cogs(
        &mut self,
        id: CustomerOrderItemId,
        cogs: Decimal,
    ) -> Result<CustomerOrderItem, RepositoryError> {
        let row = sqlx::query_as!(
            CustomerOrderItemRow,
            r#"
            UPDATE ledger.customer_order_item
            SET cogs = $2
            WHERE id = $1
            RETURNING id, customer_order_id, variant_id, quantity, sale_price, cogs
            "#,
            id.as_i32(),
            cogs
        )
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
