//! Lending transaction manager.
//!
//! Borrow, return and item deletion each run as one ledger transaction:
//! read current state, apply the consistency guard, write both ledgers,
//! commit. Any early return drops the transaction handle, which rolls it
//! back, so a refused or failed operation never leaves a partial write.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult, ErrorKind},
    models::{BorrowReceipt, DeletionReport, ReturnReceipt},
    repository::{ItemLedger, LedgerStore, LoanLedger},
};

use super::{clock::Clock, guard};

/// How retryable storage failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Attempt `n` waits `n * backoff` before starting
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl From<&LendingConfig> for RetryPolicy {
    fn from(config: &LendingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl LendingService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Lend one unit of an item: stock - 1 and a new open loan
    pub async fn borrow(&self, item_id: i32, borrower_id: i32) -> AppResult<BorrowReceipt> {
        guard::ensure_positive_id("item_id", item_id)?;
        guard::ensure_positive_id("borrower_id", borrower_id)?;

        let span = tracing::info_span!("borrow", op_id = %Uuid::new_v4(), item_id, borrower_id);
        self.with_retry("borrow", move || self.borrow_once(item_id, borrower_id))
            .instrument(span)
            .await
    }

    /// Close an open loan: stock + 1 and the loan becomes closed.
    ///
    /// A loan that does not exist and a loan already returned both fail
    /// with `NoOpenLoanFound`, so a repeated return never credits stock twice.
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<ReturnReceipt> {
        guard::ensure_positive_id("loan_id", loan_id)?;

        let span = tracing::info_span!("return", op_id = %Uuid::new_v4(), loan_id);
        self.with_retry("return", move || self.return_once(loan_id))
            .instrument(span)
            .await
    }

    /// Delete an item and its closed loan history. Refused while any loan on
    /// the item is still open.
    pub async fn delete_item(&self, item_id: i32) -> AppResult<DeletionReport> {
        guard::ensure_positive_id("item_id", item_id)?;

        let span = tracing::info_span!("delete_item", op_id = %Uuid::new_v4(), item_id);
        self.with_retry("delete_item", move || self.delete_item_once(item_id))
            .instrument(span)
            .await
    }

    async fn borrow_once(&self, item_id: i32, borrower_id: i32) -> AppResult<BorrowReceipt> {
        let mut tx = self.store.begin().await?;

        let item = tx
            .lock_item(item_id)
            .await?
            .ok_or(AppError::ItemNotFound { item_id })?;
        guard::ensure_in_stock(&item)?;

        let remaining_stock = tx.decrement_stock(item_id).await?;
        let loan = tx.open_loan(item_id, borrower_id, self.clock.now()).await?;

        tx.commit().await?;

        tracing::info!(
            "Loan {} opened on item {} for borrower {} ({} left)",
            loan.id,
            item_id,
            borrower_id,
            remaining_stock
        );
        Ok(BorrowReceipt {
            loan,
            remaining_stock,
        })
    }

    async fn return_once(&self, loan_id: i32) -> AppResult<ReturnReceipt> {
        let mut tx = self.store.begin().await?;

        let Some(loan) = tx.find_open_loan(loan_id).await? else {
            let already_returned = tx.get_loan(loan_id).await?.is_some();
            tracing::debug!(already_returned, "No open loan {}", loan_id);
            return Err(AppError::NoOpenLoanFound {
                loan_id,
                already_returned,
            });
        };
        guard::ensure_open(&loan)?;

        let item = tx.lock_item(loan.item_id).await?.ok_or_else(|| {
            AppError::Integrity(format!(
                "loan {} references missing item {}",
                loan.id, loan.item_id
            ))
        })?;
        guard::ensure_can_restock(&item)?;

        let stock = tx.increment_stock(item.id).await?;
        let loan = tx.close_loan(loan_id, self.clock.now()).await?;

        tx.commit().await?;

        tracing::info!(
            "Loan {} returned, item {} back to {} in stock",
            loan.id,
            loan.item_id,
            stock
        );
        Ok(ReturnReceipt { loan, stock })
    }

    async fn delete_item_once(&self, item_id: i32) -> AppResult<DeletionReport> {
        let mut tx = self.store.begin().await?;

        // Holding the item lock keeps concurrent borrows out until commit
        tx.lock_item(item_id)
            .await?
            .ok_or(AppError::ItemNotFound { item_id })?;

        let open_loans = tx.count_open_loans(item_id).await?;
        guard::ensure_no_open_loans(item_id, open_loans)?;

        // Loans first: nothing may be left pointing at the item
        let loans_removed = tx.delete_loans_for_item(item_id).await?;
        if !tx.delete_item(item_id).await? {
            return Err(AppError::ItemNotFound { item_id });
        }

        tx.commit().await?;

        tracing::info!(
            "Item {} deleted with {} closed loan(s)",
            item_id,
            loans_removed
        );
        Ok(DeletionReport {
            item_id,
            loans_removed,
        })
    }

    /// Run `attempt` until it succeeds, fails for a non-retryable reason, or
    /// the retry budget is spent. Every attempt is a fresh transaction.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.retry.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        "{} hit a retryable failure, attempt {}/{}: {}",
                        operation,
                        retries,
                        self.retry.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry.backoff * retries).await;
                }
                Err(e) => {
                    match e.kind() {
                        ErrorKind::Infrastructure => {
                            tracing::error!("{} aborted: {}", operation, e)
                        }
                        _ => tracing::info!("{} refused: {}", operation, e),
                    }
                    return Err(e);
                }
            }
        }
    }
}
