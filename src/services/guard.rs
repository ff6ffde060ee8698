//! Consistency guard.
//!
//! Pure checks run inside a lending transaction, after the current ledger
//! state has been read and before anything is written.

use crate::{
    error::{AppError, AppResult},
    models::{Item, Loan},
};

/// Reject ids that cannot reference a stored row
pub fn ensure_positive_id(field: &str, id: i32) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::Validation(format!(
            "{} must be a positive integer, got {}",
            field, id
        )));
    }
    Ok(())
}

/// A borrow needs at least one unit on the shelf
pub fn ensure_in_stock(item: &Item) -> AppResult<()> {
    if !item.is_available() {
        return Err(AppError::OutOfStock { item_id: item.id });
    }
    Ok(())
}

/// A return must not push stock above what the catalog owns
pub fn ensure_can_restock(item: &Item) -> AppResult<()> {
    if item.stock >= item.total_stock {
        return Err(AppError::Integrity(format!(
            "item {} already has all {} unit(s) in stock",
            item.id, item.total_stock
        )));
    }
    Ok(())
}

/// Only an open loan can be closed
pub fn ensure_open(loan: &Loan) -> AppResult<()> {
    if !loan.is_open() {
        return Err(AppError::LoanAlreadyClosed { loan_id: loan.id });
    }
    Ok(())
}

/// An item may only be deleted once every loan on it has been returned
pub fn ensure_no_open_loans(item_id: i32, open_loans: i64) -> AppResult<()> {
    if open_loans > 0 {
        return Err(AppError::HasOutstandingLoans { item_id, open_loans });
    }
    Ok(())
}
