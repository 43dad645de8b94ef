//! Book (catalog entry) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::not_blank;

/// Circulation status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "book_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
}

/// Approval gate state. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "approval_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    Pending,
    Approved,
}

/// Who is submitting a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitter {
    /// Staff path: entries are approved on creation
    Librarian,
    /// Public path: entries wait for approval when the gate is enabled
    Visitor,
}

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub code: String,
    pub title: String,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub intake_date: NaiveDate,
    pub status: BookStatus,
    pub approval: Approval,
}

impl Book {
    pub fn is_borrowable(&self, approval_gate_enabled: bool) -> bool {
        self.status == BookStatus::Available
            && (!approval_gate_enabled || self.approval == Approval::Approved)
    }
}

/// Create book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "book code is required"))]
    pub code: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "book title is required"))]
    pub title: String,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    /// Defaults to the submission day
    pub intake_date: Option<NaiveDate>,
}

/// Row to insert, after validation and approval decision
#[derive(Debug, Clone)]
pub struct NewBook {
    pub code: String,
    pub title: String,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub intake_date: NaiveDate,
    pub approval: Approval,
}

/// Partial book update. Circulation status is not editable.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateBook {
    pub code: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub intake_date: Option<NaiveDate>,
    pub approved: Option<bool>,
}

impl UpdateBook {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.title.is_none()
            && self.publisher.is_none()
            && self.year.is_none()
            && self.intake_date.is_none()
            && self.approved.is_none()
    }
}

/// Book search parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Substring matched against code, title and publisher
    pub q: Option<String>,
    /// Include books still waiting for approval
    #[serde(default)]
    pub include_pending: bool,
}

impl BookQuery {
    /// Lowercased search needle, `None` when empty
    pub fn needle(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}
