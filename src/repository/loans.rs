//! Loans repository for database operations

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use super::conflict_on_unique;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Approval, BookStatus},
        loan::{Loan, LoanDetails, NewLoan},
    },
    services::fees::{LateFee, LateFeePolicy},
};

const ALREADY_BORROWED: &str = "Book is already borrowed";

const LOAN_DETAILS: &str = r#"
    SELECT l.*, b.code AS book_code, b.title AS book_title, b.publisher, b.year,
           m.name AS member_name
    FROM loans l
    LEFT JOIN books b ON l.book_id = b.id
    LEFT JOIN members m ON l.member_id = m.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Open a loan and mark the book borrowed, in one transaction
    pub async fn open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let member: Option<i32> =
            sqlx::query_scalar("SELECT id FROM members WHERE id = $1 FOR SHARE")
                .bind(loan.member_id)
                .fetch_optional(&mut *tx)
                .await?;

        if member.is_none() {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                loan.member_id
            )));
        }

        let book: Option<(BookStatus, Approval)> =
            sqlx::query_as("SELECT status, approval FROM books WHERE id = $1 FOR UPDATE")
                .bind(loan.book_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (status, approval) = book.ok_or_else(|| {
            AppError::NotFound(format!("Book with id {} not found", loan.book_id))
        })?;

        if loan.require_approved && approval != Approval::Approved {
            return Err(AppError::Conflict("Book is not yet approved".to_string()));
        }
        if status == BookStatus::Borrowed {
            return Err(AppError::Conflict(ALREADY_BORROWED.to_string()));
        }

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, member_id, loan_date, duration_days,
                               planned_return_date, status, fee)
            VALUES ($1, $2, $3, $4, $5, 'open', 0)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.loan_date)
        .bind(loan.duration_days)
        .bind(loan.planned_return_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, ALREADY_BORROWED))?;

        sqlx::query("UPDATE books SET status = 'borrowed' WHERE id = $1")
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Close an open loan, record its fee and release the book
    pub async fn close(
        &self,
        id: i32,
        returned_on: NaiveDate,
        policy: &LateFeePolicy,
    ) -> AppResult<(Loan, LateFee)> {
        let mut tx = self.pool.begin().await?;

        let open = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE id = $1 AND status = 'open' FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Loan {} not found or already returned", id))
        })?;

        let late = policy.assess(open.planned_return_date, returned_on);

        let closed = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = 'closed', actual_return_date = $2, fee = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_on)
        .bind(late.fee)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET status = 'available' WHERE id = $1")
            .bind(open.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((closed, late))
    }

    /// Every loan, newest first
    pub async fn history(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} ORDER BY l.loan_date DESC, l.id DESC",
            LOAN_DETAILS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Open loans, optionally restricted to one member, newest first
    pub async fn open_loans(&self, member_id: Option<i32>) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE l.status = 'open' AND ($1::int IS NULL OR l.member_id = $1) \
             ORDER BY l.loan_date DESC, l.id DESC",
            LOAN_DETAILS
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
