//! Data models for the library server

pub mod book;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use book::{Approval, Book, BookStatus, Submitter};
pub use loan::{Loan, LoanDetails, LoanStatus};
pub use member::Member;

use validator::ValidationError;

/// Rejects empty and whitespace-only strings
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
