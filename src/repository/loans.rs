//! Loan ledger on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanDetails, LoanStatus},
};

use super::{postgres::PgLedgerTx, LoanLedger};

const LOAN_COLUMNS: &str = "id, item_id, borrower_id, status, opened_at, closed_at";

#[async_trait]
impl LoanLedger for PgLedgerTx {
    async fn open_loan(
        &mut self,
        item_id: i32,
        borrower_id: i32,
        opened_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (item_id, borrower_id, status, opened_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(item_id)
        .bind(borrower_id)
        .bind(LoanStatus::Open)
        .bind(opened_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn close_loan(&mut self, loan_id: i32, closed_at: DateTime<Utc>) -> AppResult<Loan> {
        // The status predicate makes the transition check-and-set
        let closed = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans SET status = $2, closed_at = $3
            WHERE id = $1 AND status = $4
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(LoanStatus::Closed)
        .bind(closed_at)
        .bind(LoanStatus::Open)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(loan) = closed {
            return Ok(loan);
        }
        match self.get_loan(loan_id).await? {
            Some(_) => Err(AppError::LoanAlreadyClosed { loan_id }),
            None => Err(AppError::NotFound(format!("Loan with id {} not found", loan_id))),
        }
    }

    async fn find_open_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 AND status = $2 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(LoanStatus::Open)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn get_loan(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn count_open_loans(&mut self, item_id: i32) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE item_id = $1 AND status = $2")
                .bind(item_id)
                .bind(LoanStatus::Open)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }

    async fn delete_loans_for_item(&mut self, item_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM loans WHERE item_id = $1")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn borrower_loans(
        &mut self,
        borrower_id: i32,
        open_only: bool,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(
            r#"
            SELECT l.id, l.item_id, i.code AS item_code, i.title AS item_title,
                   i.author AS item_author, i.category AS item_category,
                   l.borrower_id, l.status,
                   l.opened_at, l.closed_at
            FROM loans l
            JOIN items i ON i.id = l.item_id
            WHERE l.borrower_id = $1 AND (NOT $2 OR l.status = $3)
            ORDER BY l.opened_at DESC, l.id DESC
            "#,
        )
        .bind(borrower_id)
        .bind(open_only)
        .bind(LoanStatus::Open)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }
}
