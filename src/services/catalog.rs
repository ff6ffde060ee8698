//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{CreateItem, Item, ItemAudit, ItemQuery, LoanDetails, UpdateItem},
    repository::{ItemLedger, LedgerStore, LoanLedger},
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// List items, optionally restricted to one category
    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<(Vec<Item>, i64)> {
        let mut tx = self.store.begin().await?;
        let page = tx.list_items(query).await?;
        tx.commit().await?;
        Ok(page)
    }

    /// Get item by ID
    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        let mut tx = self.store.begin().await?;
        let item = tx.get_item(id).await?;
        tx.commit().await?;
        item.ok_or(AppError::ItemNotFound { item_id: id })
    }

    /// Create a new item; its initial stock is also its total stock
    pub async fn create_item(&self, item: CreateItem) -> AppResult<Item> {
        item.validate()?;

        let mut tx = self.store.begin().await?;
        if tx.code_exists(&item.code, None).await? {
            return Err(AppError::Conflict(format!(
                "Item code {} already exists",
                item.code
            )));
        }
        let created = tx.insert_item(&item).await?;
        tx.commit().await?;

        tracing::info!(
            "Catalog create: item id={} code={} stock={}",
            created.id,
            created.code,
            created.stock
        );
        Ok(created)
    }

    /// Update descriptive fields of an item
    pub async fn update_item(&self, id: i32, update: UpdateItem) -> AppResult<Item> {
        update.validate()?;

        let mut tx = self.store.begin().await?;
        if let Some(code) = &update.code {
            if tx.code_exists(code, Some(id)).await? {
                return Err(AppError::Conflict(format!("Item code {} already exists", code)));
            }
        }
        let updated = tx.update_item(id, &update).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Loan history of a borrower, most recent first
    pub async fn borrower_loans(
        &self,
        borrower_id: i32,
        open_only: bool,
    ) -> AppResult<Vec<LoanDetails>> {
        let mut tx = self.store.begin().await?;
        let loans = tx.borrower_loans(borrower_id, open_only).await?;
        tx.commit().await?;
        Ok(loans)
    }

    /// Compare an item's stock counter with its open loans
    pub async fn audit_item(&self, id: i32) -> AppResult<ItemAudit> {
        let mut tx = self.store.begin().await?;
        let item = tx
            .get_item(id)
            .await?
            .ok_or(AppError::ItemNotFound { item_id: id })?;
        let open_loans = tx.count_open_loans(id).await?;
        tx.commit().await?;

        let audit = ItemAudit::new(&item, open_loans);
        if !audit.consistent {
            tracing::warn!(
                "Item {} stock drift: stock={} open_loans={} total={}",
                id,
                audit.stock,
                audit.open_loans,
                audit.total_stock
            );
        }
        Ok(audit)
    }
}
