//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Loan state. `Open -> Closed` is the only transition; `Closed` is terminal.
/// DB stores as i16 (0 = open, 1 = closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open = 0,
    Closed = 1,
}

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub borrower_id: i32,
    pub status: LoanStatus,
    pub opened_at: DateTime<Utc>,
    /// Set when the loan is closed
    pub closed_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }
}

/// Loan joined with its item, for borrower history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub item_id: i32,
    pub item_code: String,
    pub item_title: String,
    pub item_author: String,
    pub item_category: String,
    pub borrower_id: i32,
    pub status: LoanStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[validate(range(min = 1, message = "item_id must be a positive integer"))]
    pub item_id: i32,
    #[validate(range(min = 1, message = "borrower_id must be a positive integer"))]
    pub borrower_id: i32,
}

/// Result of a committed borrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BorrowReceipt {
    pub loan: Loan,
    /// Item stock after the borrow
    pub remaining_stock: i32,
}

/// Result of a committed return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub loan: Loan,
    /// Item stock after the return
    pub stock: i32,
}
