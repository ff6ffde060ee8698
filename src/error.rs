//! Error types for the lending server

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes exposed in error response bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NoSuchItem = 5,
    OutOfStock = 7,
    Duplicate = 8,
    BadValue = 18,
    NoSuchData = 20,
    ItemHasOpenLoans = 21,
    LoanAlreadyClosed = 22,
    Busy = 23,
}

/// Coarse classification of failures.
///
/// Every variant of [`AppError`] belongs to exactly one kind. All kinds are
/// raised before commit, so none of them leave a partial mutation behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; nothing happened.
    Validation,
    /// Referenced entity absent; nothing happened.
    NotFound,
    /// Refused by an invariant; nothing happened.
    BusinessRule,
    /// Storage or transaction failure; the transaction was aborted.
    Infrastructure,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Item {item_id} not found")]
    ItemNotFound { item_id: i32 },

    /// No open loan with this id. `already_returned` records whether the loan
    /// exists but was closed earlier; both cases are reported the same way
    /// over HTTP.
    #[error("No open loan found with id {loan_id}")]
    NoOpenLoanFound { loan_id: i32, already_returned: bool },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item {item_id} is out of stock")]
    OutOfStock { item_id: i32 },

    #[error("Item {item_id} has {open_loans} outstanding loan(s)")]
    HasOutstandingLoans { item_id: i32, open_loans: i64 },

    #[error("Loan {loan_id} is already closed")]
    LoanAlreadyClosed { loan_id: i32 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger integrity violation: {0}")]
    Integrity(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// PostgreSQL SQLSTATE codes that indicate a transaction may succeed if
/// started again: serialization failure, deadlock, lock timeout, statement
/// timeout.
const RETRYABLE_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::ItemNotFound { .. }
            | AppError::NoOpenLoanFound { .. }
            | AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::OutOfStock { .. }
            | AppError::HasOutstandingLoans { .. }
            | AppError::LoanAlreadyClosed { .. }
            | AppError::Conflict(_) => ErrorKind::BusinessRule,
            AppError::Database(_)
            | AppError::Unavailable(_)
            | AppError::Integrity(_)
            | AppError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether the failed operation can be attempted again as a fresh
    /// transaction without caller intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Unavailable(_) => true,
            AppError::Database(sqlx::Error::PoolTimedOut) => true,
            AppError::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|code| RETRYABLE_SQLSTATES.contains(&&*code))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::ItemNotFound { .. } => (StatusCode::NOT_FOUND, ErrorCode::NoSuchItem),
            AppError::NoOpenLoanFound { .. } | AppError::NotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData)
            }
            AppError::OutOfStock { .. } => (StatusCode::CONFLICT, ErrorCode::OutOfStock),
            AppError::HasOutstandingLoans { .. } => {
                (StatusCode::CONFLICT, ErrorCode::ItemHasOpenLoans)
            }
            AppError::LoanAlreadyClosed { .. } => {
                (StatusCode::CONFLICT, ErrorCode::LoanAlreadyClosed)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            e if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Busy),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Unavailable(_) | AppError::Integrity(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure)
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let retryable = self.is_retryable();

        let message = match self.kind() {
            ErrorKind::Infrastructure => {
                tracing::error!("Infrastructure error: {:?}", self);
                if retryable {
                    "Storage is busy, retry the request".to_string()
                } else {
                    "Internal server error".to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            retryable,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
