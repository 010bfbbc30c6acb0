//! CLI command implementations.

pub mod ledger;
pub mod migrate;

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use stockroom_core::{Actor, ActorError};
use stockroom_ledger::config::{ConfigError, LedgerConfig};
use stockroom_ledger::{Ledger, LedgerError, PgLedgerStore, SystemClock, db};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The `--actor` value is invalid.
    #[error("Invalid actor: {0}")]
    Actor(#[from] ActorError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Result could not be written as JSON.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Everything a command needs: the pool, the ledger over it and the actor.
pub struct Context {
    pub pool: PgPool,
    pub ledger: Ledger<PgLedgerStore>,
    pub actor: Actor,
}

impl Context {
    /// Load configuration and connect.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if configuration is invalid or the database
    /// cannot be reached.
    pub async fn from_env(actor_override: Option<&str>) -> Result<Self, CommandError> {
        let config = LedgerConfig::from_env()?;
        let actor = match actor_override {
            Some(raw) => Actor::parse(raw)?,
            None => config.actor.clone(),
        };

        tracing::info!("Connecting to ledger database...");
        let pool = db::create_pool(&config.database).await?;
        let ledger = Ledger::new(
            PgLedgerStore::new(pool.clone()),
            Arc::new(SystemClock),
            config.unknown_arrival_policy,
        );

        Ok(Self {
            pool,
            ledger,
            actor,
        })
    }
}

/// Print a result as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}
