//! Stock audit log: an append-only record of every quantity change.

use tracing::debug;

use stockroom_core::VariantId;

use crate::db::{LedgerStore, LedgerTx, StockChangeStore, VariantStore};
use crate::error::LedgerError;
use crate::models::{NewStockChange, OrderRef, StockChangeEntry};

/// Writes and reads audit entries. There is no update or delete.
#[derive(Debug, Clone)]
pub struct StockAuditLog<S> {
    store: S,
}

impl<S: LedgerStore> StockAuditLog<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Append an entry inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the insert fails.
    pub async fn record_in(
        &self,
        tx: &mut S::Tx,
        entry: &NewStockChange,
    ) -> Result<StockChangeEntry, LedgerError> {
        let recorded = tx.insert_stock_change(entry).await?;
        debug!(
            variant_id = %recorded.variant_id,
            change = recorded.change,
            reason = %recorded.reason,
            actor = %recorded.actor,
            "Recorded stock change"
        );
        Ok(recorded)
    }

    /// Entries for a variant, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the variant does not exist.
    pub async fn list_for_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<StockChangeEntry>, LedgerError> {
        let mut tx = self.store.begin().await?;
        if tx.get_variant(variant_id).await?.is_none() {
            return Err(LedgerError::not_found("variant", variant_id));
        }
        let entries = tx.list_stock_changes_for_variant(variant_id).await?;
        tx.commit().await?;
        Ok(entries)
    }

    /// Entries attributed to an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the query fails.
    pub async fn list_for_order(&self, order: OrderRef) -> Result<Vec<StockChangeEntry>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let entries = tx.list_stock_changes_for_order(order).await?;
        tx.commit().await?;
        Ok(entries)
    }
}
