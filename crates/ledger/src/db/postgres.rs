//! `PostgreSQL` ledger store.
//!
//! Transactions run at READ COMMITTED. Fulfillment locks the lot rows it
//! reads with `FOR UPDATE`, so a concurrent fulfillment of the same variant
//! waits and then re-reads the committed remaining quantities.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{LedgerStore, LedgerTx, RepositoryError};

/// Ledger store backed by a shared `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open `PostgreSQL` transaction.
pub struct PgLedgerTx {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
