//! Item (catalog entry) model and related types.
//!
//! An item carries a bounded stock counter. `total_stock` is the number of
//! units the catalog owns; `stock` is how many are on the shelf. The
//! difference is always the number of open loans referencing the item.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Full item model (DB + API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    /// External catalog number (ISBN or similar), unique
    pub code: String,
    pub title: String,
    pub author: String,
    pub category: String,
    /// Units currently on the shelf
    pub stock: i32,
    /// Units owned by the catalog
    pub total_stock: i32,
    pub publish_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 32, message = "Code must be 1 to 32 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 64, message = "Category must be 1 to 64 characters"))]
    pub category: String,
    /// Initial stock; becomes both `stock` and `total_stock`
    #[validate(range(min = 0, message = "Stock must be a non-negative integer"))]
    pub stock: i32,
    pub publish_date: Option<NaiveDate>,
}

/// Update item request. Stock is not editable here: it only moves through
/// borrow and return.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(min = 1, max = 32, message = "Code must be 1 to 32 characters"))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Category must be 1 to 64 characters"))]
    pub category: Option<String>,
    pub publish_date: Option<NaiveDate>,
}

/// Item listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    /// Exact category match
    pub category: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ItemQuery {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 200;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        self.page().saturating_sub(1).saturating_mul(self.per_page())
    }
}

/// Outcome of a successful item deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeletionReport {
    pub item_id: i32,
    /// Closed loans purged together with the item
    pub loans_removed: u64,
}

/// Stock reconciliation for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemAudit {
    pub item_id: i32,
    pub stock: i32,
    pub total_stock: i32,
    pub open_loans: i64,
    /// `stock + open_loans == total_stock` and `0 <= stock <= total_stock`
    pub consistent: bool,
}

impl ItemAudit {
    pub fn new(item: &Item, open_loans: i64) -> Self {
        let consistent = item.stock >= 0
            && item.stock <= item.total_stock
            && i64::from(item.stock) + open_loans == i64::from(item.total_stock);
        Self {
            item_id: item.id,
            stock: item.stock,
            total_stock: item.total_stock,
            open_loans,
            consistent,
        }
    }
}
