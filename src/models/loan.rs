//! Loan (borrow) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Closed,
}

/// Loan model from database.
///
/// `book_id` and `member_id` are only ever `None` on closed loans whose book
/// or member has since been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub loan_date: NaiveDate,
    pub duration_days: i32,
    pub planned_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub fee: i64,
}

/// Loan joined with the book and member it references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub loan_date: NaiveDate,
    pub duration_days: i32,
    pub planned_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub fee: i64,
    pub book_code: Option<String>,
    pub book_title: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub member_name: Option<String>,
}

/// Borrow request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: Option<i32>,
    /// Existing member; takes precedence over `member_name`
    pub member_id: Option<i32>,
    /// Member looked up by name, registered when absent
    pub member_name: Option<String>,
    /// Defaults to the configured loan duration
    pub duration_days: Option<i32>,
}

/// Return request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Calendar date (`YYYY-MM-DD`); may lie in the past
    pub actual_return_date: Option<String>,
}

/// Row to insert when a borrow is accepted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub duration_days: i32,
    pub planned_return_date: NaiveDate,
    /// Refuse books that are still pending approval
    pub require_approved: bool,
}

/// Result of a successful borrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BorrowReceipt {
    pub loan_id: i32,
    pub planned_return_date: NaiveDate,
}

/// Result of a successful return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReturnReceipt {
    pub loan_id: i32,
    pub days_late: i64,
    pub fee: i64,
}
