//! Operator commands over the ledger.
//!
//! Each command prints its result as JSON.

use serde::Serialize;
use stockroom_core::{CustomerOrderId, PurchaseOrderId, VariantId};
use stockroom_ledger::models::InventoryLot;

use super::{CommandError, Context, print_json};

#[derive(Serialize)]
struct StockReport {
    variant_id: VariantId,
    available: i64,
}

#[derive(Serialize)]
struct VoidReport {
    order_id: CustomerOrderId,
    restocked_lots: Vec<InventoryLot>,
}

/// Receive a purchase order.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the order does not exist or the
/// receipt fails.
pub async fn receive_po(ctx: &Context, id: PurchaseOrderId) -> Result<(), CommandError> {
    let order = ctx.ledger.orders.receive_purchase_order(id, &ctx.actor).await?;
    print_json(&order)
}

/// Void a customer order.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the order does not exist or is
/// already voided.
pub async fn void(ctx: &Context, order_id: CustomerOrderId) -> Result<(), CommandError> {
    let restocked_lots = ctx
        .ledger
        .orders
        .void_customer_order(order_id, &ctx.actor)
        .await?;
    print_json(&VoidReport {
        order_id,
        restocked_lots,
    })
}

/// Show available units.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the variant does not exist.
pub async fn stock(ctx: &Context, variant_id: VariantId) -> Result<(), CommandError> {
    let available = ctx.ledger.lots.available_stock(variant_id).await?;
    print_json(&StockReport {
        variant_id,
        available,
    })
}

/// List lots in FIFO order.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the variant does not exist.
pub async fn lots(ctx: &Context, variant_id: VariantId) -> Result<(), CommandError> {
    let lots = ctx.ledger.lots.list_lots(variant_id).await?;
    print_json(&lots)
}

/// List stock changes, newest first.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the variant does not exist.
pub async fn history(ctx: &Context, variant_id: VariantId) -> Result<(), CommandError> {
    let entries = ctx.ledger.audit.list_for_variant(variant_id).await?;
    print_json(&entries)
}

/// List customer orders with their lines, newest first.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the query fails.
pub async fn orders(ctx: &Context) -> Result<(), CommandError> {
    let orders = ctx.ledger.orders.list_customer_orders().await?;
    print_json(&orders)
}

/// List purchase orders with their lines, oldest first.
///
/// # Errors
///
/// Returns `CommandError::Ledger` if the query fails.
pub async fn purchase_orders(ctx: &Context) -> Result<(), CommandError> {
    let orders = ctx.ledger.orders.list_purchase_orders().await?;
    print_json(&orders)
}
