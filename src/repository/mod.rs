//! Repository layer: the item and loan ledgers.
//!
//! Every read and write goes through a [`LedgerTx`] obtained from a
//! [`LedgerStore`]. Writes only become visible on [`LedgerTx::commit`];
//! dropping a transaction without committing rolls it back, so a handle that
//! leaves scope through `?` never leaks a partial change.

pub mod items;
pub mod loans;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{CreateItem, Item, ItemQuery, Loan, LoanDetails, UpdateItem},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Item ledger operations, scoped to one transaction
#[async_trait]
pub trait ItemLedger: Send {
    /// Read an item without locking it
    async fn get_item(&mut self, item_id: i32) -> AppResult<Option<Item>>;

    /// Read an item and hold its row lock until the transaction ends
    async fn lock_item(&mut self, item_id: i32) -> AppResult<Option<Item>>;

    async fn exists(&mut self, item_id: i32) -> AppResult<bool> {
        Ok(self.get_item(item_id).await?.is_some())
    }

    /// Current stock, or `ItemNotFound`
    async fn get_stock(&mut self, item_id: i32) -> AppResult<i32>;

    /// Take one unit off the shelf. Fails with `ItemNotFound` or, when the
    /// counter is already zero, `OutOfStock`. Returns the new count.
    async fn decrement_stock(&mut self, item_id: i32) -> AppResult<i32>;

    /// Put one unit back. Fails with `ItemNotFound`, or `Integrity` if the
    /// counter would exceed the item's total stock. Returns the new count.
    async fn increment_stock(&mut self, item_id: i32) -> AppResult<i32>;

    async fn insert_item(&mut self, item: &CreateItem) -> AppResult<Item>;

    /// Update descriptive fields; stock is left untouched
    async fn update_item(&mut self, item_id: i32, update: &UpdateItem) -> AppResult<Item>;

    async fn list_items(&mut self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)>;

    /// Whether another item already uses `code`
    async fn code_exists(&mut self, code: &str, exclude_id: Option<i32>) -> AppResult<bool>;

    /// Remove the item row. Returns false if it did not exist.
    async fn delete_item(&mut self, item_id: i32) -> AppResult<bool>;
}

/// Loan ledger operations, scoped to one transaction
#[async_trait]
pub trait LoanLedger: Send {
    async fn open_loan(
        &mut self,
        item_id: i32,
        borrower_id: i32,
        opened_at: DateTime<Utc>,
    ) -> AppResult<Loan>;

    /// Close an open loan. A second close on the same id fails with
    /// `LoanAlreadyClosed`; an unknown id fails with `NotFound`.
    async fn close_loan(&mut self, loan_id: i32, closed_at: DateTime<Utc>) -> AppResult<Loan>;

    /// Open loan by id, locked until the transaction ends. `None` when the
    /// loan is missing or already closed.
    async fn find_open_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// Loan by id in any state
    async fn get_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    async fn count_open_loans(&mut self, item_id: i32) -> AppResult<i64>;

    async fn has_open_loans(&mut self, item_id: i32) -> AppResult<bool> {
        Ok(self.count_open_loans(item_id).await? > 0)
    }

    /// Delete every loan referencing the item. Returns the number removed.
    async fn delete_loans_for_item(&mut self, item_id: i32) -> AppResult<u64>;

    async fn borrower_loans(
        &mut self,
        borrower_id: i32,
        open_only: bool,
    ) -> AppResult<Vec<LoanDetails>>;
}

/// A transaction spanning both ledgers
#[async_trait]
pub trait LedgerTx: ItemLedger + LoanLedger {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Source of ledger transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Cheap connectivity probe for readiness checks
    async fn ping(&self) -> AppResult<()>;
}
