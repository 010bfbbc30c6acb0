//! Stockroom Ledger - FIFO-costed inventory and order lifecycle.
//!
//! Stock lives in cost lots. Receiving a purchase order creates one lot per
//! line; a sale consumes lots oldest-first and records the cost of goods
//! sold on the order line; a void puts the units back as a new lot. Every
//! quantity change is appended to the stock audit log.
//!
//! Available stock is never stored: it is the sum of remaining quantities
//! across a variant's lots.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stockroom_ledger::{Ledger, PgLedgerStore, SystemClock, config::LedgerConfig, db};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LedgerConfig::from_env()?;
//! let pool = db::create_pool(&config.database).await?;
//! stockroom_ledger::migrate(&pool).await?;
//!
//! let ledger = Ledger::new(
//!     PgLedgerStore::new(pool),
//!     Arc::new(SystemClock),
//!     config.unknown_arrival_policy,
//! );
//! let _order = ledger
//!     .orders
//!     .receive_purchase_order(7.into(), &config.actor)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, RepositoryError};
pub use error::{ErrorKind, LedgerError};
pub use services::{Ledger, UnknownArrivalPolicy};

/// Apply the ledger schema migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the applied history
/// does not match the embedded files.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
