//! PostgreSQL ledger store

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;

use crate::error::{AppError, AppResult};

use super::{LedgerStore, LedgerTx};

/// SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Ledger store backed by a PostgreSQL pool.
///
/// Each transaction runs at READ COMMITTED with explicit row locks
/// (`SELECT ... FOR UPDATE`) and conditional updates, and sets a local
/// `lock_timeout` so a stuck lock surfaces as a retryable error.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// One open PostgreSQL transaction. Ledger operations live in
/// `repository::items` and `repository::loans`.
pub struct PgLedgerTx {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Turn a unique violation into a `Conflict`, pass anything else through
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::Conflict(message())
        }
        _ => AppError::Database(err),
    }
}
