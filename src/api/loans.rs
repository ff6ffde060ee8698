//! Loan endpoints: borrow, return, borrower history

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, Loan, LoanDetails},
};

/// Borrow response
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    /// Loan ID, needed to return the item
    pub loan_id: i32,
    pub item_id: i32,
    pub borrower_id: i32,
    pub opened_at: DateTime<Utc>,
    /// Item stock after the borrow
    pub remaining_stock: i32,
    /// Status message
    pub message: String,
}

/// Return response with the closed loan
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    pub loan: Loan,
    /// Item stock after the return
    pub stock: i32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BorrowerLoansQuery {
    /// Only loans not yet returned (default: false)
    pub open_only: Option<bool>,
}

/// Borrow an item
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan opened", body = LoanResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Item out of stock", body = crate::error::ErrorResponse),
        (status = 503, description = "Storage busy, safe to retry", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    payload: Result<Json<CreateLoan>, JsonRejection>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let Json(request) = payload?;
    request.validate()?;

    let receipt = state
        .services
        .lending
        .borrow(request.item_id, request.borrower_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            loan_id: receipt.loan.id,
            item_id: receipt.loan.item_id,
            borrower_id: receipt.loan.borrower_id,
            opened_at: receipt.loan.opened_at,
            remaining_stock: receipt.remaining_stock,
            message: "Item borrowed successfully".to_string(),
        }),
    ))
}

/// Return a borrowed item
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Item returned", body = ReturnResponse),
        (status = 404, description = "No open loan with this ID", body = crate::error::ErrorResponse),
        (status = 503, description = "Storage busy, safe to retry", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    loan_id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ReturnResponse>> {
    let Path(loan_id) = loan_id?;

    let receipt = state.services.lending.return_loan(loan_id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan: receipt.loan,
        stock: receipt.stock,
    }))
}

/// Get the loans of a borrower
#[utoipa::path(
    get,
    path = "/borrowers/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Borrower ID"),
        BorrowerLoansQuery
    ),
    responses(
        (status = 200, description = "Borrower's loans, most recent first", body = Vec<LoanDetails>)
    )
)]
pub async fn get_borrower_loans(
    State(state): State<crate::AppState>,
    borrower_id: Result<Path<i32>, PathRejection>,
    query: Result<Query<BorrowerLoansQuery>, QueryRejection>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let Path(borrower_id) = borrower_id?;
    let Query(query) = query?;

    let loans = state
        .services
        .catalog
        .borrower_loans(borrower_id, query.open_only.unwrap_or(false))
        .await?;
    Ok(Json(loans))
}
