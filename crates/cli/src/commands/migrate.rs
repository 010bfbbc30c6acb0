//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! stockroom migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Ledger migrations live in `crates/ledger/migrations/` and are embedded
//! into the binary at build time.

use super::{CommandError, Context};

/// Apply pending ledger migrations.
///
/// # Errors
///
/// Returns `CommandError::Migrate` if a migration fails.
pub async fn run(ctx: &Context) -> Result<(), CommandError> {
    tracing::info!("Running ledger migrations...");
    stockroom_ledger::migrate(&ctx.pool).await?;
    tracing::info!("Ledger migrations complete!");
    Ok(())
}
