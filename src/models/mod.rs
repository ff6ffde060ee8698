//! Data models for the lending server

pub mod item;
pub mod loan;

// Re-export commonly used types
pub use item::{CreateItem, DeletionReport, Item, ItemAudit, ItemQuery, UpdateItem};
pub use loan::{BorrowReceipt, CreateLoan, Loan, LoanDetails, LoanStatus, ReturnReceipt};
