//! In-memory ledger store.
//!
//! Transactions are fully serialized: `begin` takes an owned async lock on
//! both ledgers and works on a private copy, which `commit` publishes. A
//! dropped transaction releases the lock and its copy is discarded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{CreateItem, Item, ItemQuery, Loan, LoanDetails, LoanStatus, UpdateItem},
};

use super::{ItemLedger, LedgerStore, LedgerTx, LoanLedger};

#[derive(Debug, Clone, Default)]
struct Ledgers {
    items: BTreeMap<i32, Item>,
    loans: BTreeMap<i32, Loan>,
    last_item_id: i32,
    last_loan_id: i32,
}

#[derive(Clone)]
pub struct MemoryStore {
    ledgers: Arc<Mutex<Ledgers>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            ledgers: Arc::new(Mutex::new(Ledgers::default())),
            lock_timeout,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

pub struct MemoryTx {
    committed: OwnedMutexGuard<Ledgers>,
    working: Ledgers,
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let committed = tokio::time::timeout(self.lock_timeout, self.ledgers.clone().lock_owned())
            .await
            .map_err(|_| {
                AppError::Unavailable(format!(
                    "timed out after {:?} waiting for the ledger lock",
                    self.lock_timeout
                ))
            })?;
        let working = (*committed).clone();
        Ok(Box::new(MemoryTx { committed, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx {
            mut committed,
            working,
        } = *self;
        *committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

impl MemoryTx {
    fn code_taken(&self, code: &str, exclude_id: Option<i32>) -> bool {
        self.working
            .items
            .values()
            .any(|item| item.code == code && Some(item.id) != exclude_id)
    }
}

#[async_trait]
impl ItemLedger for MemoryTx {
    async fn get_item(&mut self, item_id: i32) -> AppResult<Option<Item>> {
        Ok(self.working.items.get(&item_id).cloned())
    }

    async fn lock_item(&mut self, item_id: i32) -> AppResult<Option<Item>> {
        // The whole store is already held by this transaction
        self.get_item(item_id).await
    }

    async fn get_stock(&mut self, item_id: i32) -> AppResult<i32> {
        self.working
            .items
            .get(&item_id)
            .map(|item| item.stock)
            .ok_or(AppError::ItemNotFound { item_id })
    }

    async fn decrement_stock(&mut self, item_id: i32) -> AppResult<i32> {
        let item = self
            .working
            .items
            .get_mut(&item_id)
            .ok_or(AppError::ItemNotFound { item_id })?;
        if item.stock == 0 {
            return Err(AppError::OutOfStock { item_id });
        }
        item.stock -= 1;
        Ok(item.stock)
    }

    async fn increment_stock(&mut self, item_id: i32) -> AppResult<i32> {
        let item = self
            .working
            .items
            .get_mut(&item_id)
            .ok_or(AppError::ItemNotFound { item_id })?;
        if item.stock >= item.total_stock {
            return Err(AppError::Integrity(format!(
                "stock of item {} is already at its total",
                item_id
            )));
        }
        item.stock += 1;
        Ok(item.stock)
    }

    async fn insert_item(&mut self, item: &CreateItem) -> AppResult<Item> {
        if self.code_taken(&item.code, None) {
            return Err(AppError::Conflict(format!(
                "Item code {} already exists",
                item.code
            )));
        }

        self.working.last_item_id += 1;
        let created = Item {
            id: self.working.last_item_id,
            code: item.code.clone(),
            title: item.title.clone(),
            author: item.author.clone(),
            category: item.category.clone(),
            stock: item.stock,
            total_stock: item.stock,
            publish_date: item.publish_date,
            created_at: Utc::now(),
        };
        self.working.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_item(&mut self, item_id: i32, update: &UpdateItem) -> AppResult<Item> {
        if let Some(code) = &update.code {
            if self.code_taken(code, Some(item_id)) {
                return Err(AppError::Conflict("Item code already exists".to_string()));
            }
        }

        let item = self
            .working
            .items
            .get_mut(&item_id)
            .ok_or(AppError::ItemNotFound { item_id })?;
        if let Some(code) = &update.code {
            item.code = code.clone();
        }
        if let Some(title) = &update.title {
            item.title = title.clone();
        }
        if let Some(author) = &update.author {
            item.author = author.clone();
        }
        if let Some(category) = &update.category {
            item.category = category.clone();
        }
        if update.publish_date.is_some() {
            item.publish_date = update.publish_date;
        }
        Ok(item.clone())
    }

    async fn list_items(&mut self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let matching: Vec<&Item> = self
            .working
            .items
            .values()
            .filter(|item| {
                query
                    .category
                    .as_ref()
                    .map_or(true, |category| &item.category == category)
            })
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.per_page() as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn code_exists(&mut self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.code_taken(code, exclude_id))
    }

    async fn delete_item(&mut self, item_id: i32) -> AppResult<bool> {
        if self.working.loans.values().any(|loan| loan.item_id == item_id) {
            return Err(AppError::Integrity(format!(
                "item {} is still referenced by loans",
                item_id
            )));
        }
        Ok(self.working.items.remove(&item_id).is_some())
    }
}

#[async_trait]
impl LoanLedger for MemoryTx {
    async fn open_loan(
        &mut self,
        item_id: i32,
        borrower_id: i32,
        opened_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        if !self.working.items.contains_key(&item_id) {
            return Err(AppError::Integrity(format!(
                "loan references missing item {}",
                item_id
            )));
        }

        self.working.last_loan_id += 1;
        let loan = Loan {
            id: self.working.last_loan_id,
            item_id,
            borrower_id,
            status: LoanStatus::Open,
            opened_at,
            closed_at: None,
        };
        self.working.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn close_loan(&mut self, loan_id: i32, closed_at: DateTime<Utc>) -> AppResult<Loan> {
        let loan = self
            .working
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        if loan.status == LoanStatus::Closed {
            return Err(AppError::LoanAlreadyClosed { loan_id });
        }
        loan.status = LoanStatus::Closed;
        loan.closed_at = Some(closed_at);
        Ok(loan.clone())
    }

    async fn find_open_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self
            .working
            .loans
            .get(&loan_id)
            .filter(|loan| loan.is_open())
            .cloned())
    }

    async fn get_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn count_open_loans(&mut self, item_id: i32) -> AppResult<i64> {
        Ok(self
            .working
            .loans
            .values()
            .filter(|loan| loan.item_id == item_id && loan.is_open())
            .count() as i64)
    }

    async fn delete_loans_for_item(&mut self, item_id: i32) -> AppResult<u64> {
        let before = self.working.loans.len();
        self.working.loans.retain(|_, loan| loan.item_id != item_id);
        Ok((before - self.working.loans.len()) as u64)
    }

    async fn borrower_loans(
        &mut self,
        borrower_id: i32,
        open_only: bool,
    ) -> AppResult<Vec<LoanDetails>> {
        let mut loans: Vec<LoanDetails> = self
            .working
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && (!open_only || loan.is_open()))
            .filter_map(|loan| {
                let item = self.working.items.get(&loan.item_id)?;
                Some(LoanDetails {
                    id: loan.id,
                    item_id: item.id,
                    item_code: item.code.clone(),
                    item_title: item.title.clone(),
                    item_author: item.author.clone(),
                    item_category: item.category.clone(),
                    borrower_id: loan.borrower_id,
                    status: loan.status,
                    opened_at: loan.opened_at,
                    closed_at: loan.closed_at,
                })
            })
            .collect();

        loans.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then(b.id.cmp(&a.id)));
        Ok(loans)
    }
}
