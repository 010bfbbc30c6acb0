//! Business logic services for the ledger.
//!
//! # Services
//!
//! - `lots` - Inventory lot manager: receipt, manual lots, stock queries
//! - `fulfillment` - FIFO fulfillment engine and COGS
//! - `orders` - Order lifecycle: customer orders, receipt, void, PO edits
//! - `audit` - Append-only stock change log
//!
//! [`Ledger`] bundles all four over one store and clock.

pub mod audit;
pub mod fulfillment;
pub mod lots;
pub mod orders;

use std::sync::Arc;

pub use audit::StockAuditLog;
pub use fulfillment::{
    Consumption, CostingGap, FulfillmentEngine, FulfillmentOutcome, LotDraw, UnknownArrivalPolicy,
};
pub use lots::{InventoryLotManager, ManualLot, StockReceipt};
pub use orders::OrderLifecycle;

use crate::clock::Clock;
use crate::db::LedgerStore;

/// The ledger's public surface.
#[derive(Clone)]
pub struct Ledger<S> {
    pub lots: InventoryLotManager<S>,
    pub fulfillment: FulfillmentEngine<S>,
    pub orders: OrderLifecycle<S>,
    pub audit: StockAuditLog<S>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Build every service over `store`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: UnknownArrivalPolicy) -> Self {
        Self {
            lots: InventoryLotManager::new(store.clone(), Arc::clone(&clock), policy),
            fulfillment: FulfillmentEngine::new(store.clone(), Arc::clone(&clock), policy),
            orders: OrderLifecycle::new(store.clone(), clock, policy),
            audit: StockAuditLog::new(store),
        }
    }
}
