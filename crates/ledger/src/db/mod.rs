//! Ledger store: the transactional persistence seam.
//!
//! # Database: `ledger` schema in `PostgreSQL`
//!
//! ## Tables
//!
//! - `product_variant` - Sellable SKUs (no stock counter)
//! - `inventory_lot` - Cost lots; FIFO consumes these
//! - `purchase_order` / `purchase_order_item` - Inbound supplier batches
//! - `customer_order` / `customer_order_item` - Sales with computed COGS
//! - `stock_change` - Append-only audit log
//!
//! # Transactions
//!
//! Every service operation runs inside one [`LedgerTx`] obtained from
//! [`LedgerStore::begin`]. Dropping a transaction without calling
//! [`LedgerTx::commit`] rolls it back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/ledger/migrations/` and run via:
//! ```bash
//! cargo run -p stockroom-cli -- migrate
//! ```

pub mod customer_orders;
pub mod inventory_lot;
pub mod memory;
pub mod postgres;
pub mod purchase_orders;
pub mod stock_changes;
pub mod variants;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub use customer_orders::CustomerOrderStore;
pub use inventory_lot::LotStore;
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use purchase_orders::PurchaseOrderStore;
pub use stock_changes::StockChangeStore;
pub use variants::VariantStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate batch number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A handle that opens ledger transactions.
///
/// Implementations are cheap to clone (a pool handle).
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    /// Transaction type produced by this store.
    type Tx: LedgerTx;

    /// Open a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if no connection can be acquired.
    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;
}

/// One open ledger transaction with access to every table.
#[async_trait]
pub trait LedgerTx:
    VariantStore + LotStore + PurchaseOrderStore + CustomerOrderStore + StockChangeStore + Send
{
    /// Make all writes of this transaction durable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the commit fails; nothing is
    /// persisted in that case.
    async fn commit(self) -> Result<(), RepositoryError>;

    /// Discard all writes of this transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the rollback fails.
    async fn rollback(self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool from the ledger database settings.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(config.url.expose_secret())
        .await
}

/// Map a violation of `constraint` to `RepositoryError::Conflict`.
pub(crate) fn map_constraint(
    error: sqlx::Error,
    constraint: &str,
    message: impl FnOnce() -> String,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.constraint() == Some(constraint)
    {
        return RepositoryError::Conflict(message());
    }
    RepositoryError::Database(error)
}

/// Parse a stored `TEXT` enum column.
pub(crate) fn parse_column<T>(column: &str, raw: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| RepositoryError::DataCorruption(format!("{column}: {e}")))
}
