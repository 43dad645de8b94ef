//! Repository layer: the store boundary the services talk to.
//!
//! Every mutating operation on [`LibraryStore`] is all-or-nothing. The
//! PostgreSQL implementation runs each one in a transaction with row locks;
//! the in-memory implementation runs each one under a single lock.

pub mod books;
pub mod loans;
pub mod members;
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, NewBook, UpdateBook},
        loan::{Loan, LoanDetails, NewLoan},
        member::{Member, NewMember},
    },
    services::fees::{LateFee, LateFeePolicy},
};

pub use memory::MemoryStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Cheap round trip used by the readiness check
    async fn ping(&self) -> AppResult<()>;

    // -- catalog --
    async fn books_search(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    /// Available and approved books, ordered by code
    async fn books_available(&self) -> AppResult<Vec<Book>>;
    async fn books_pending(&self) -> AppResult<Vec<Book>>;
    async fn books_get(&self, id: i32) -> AppResult<Book>;
    async fn books_code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn books_create(&self, book: &NewBook) -> AppResult<Book>;
    async fn books_update(&self, id: i32, changes: &UpdateBook) -> AppResult<Book>;
    /// Flip a pending book to approved
    async fn books_approve(&self, id: i32) -> AppResult<Book>;
    /// Delete a pending book
    async fn books_reject(&self, id: i32) -> AppResult<()>;
    /// Delete a book that is not on loan
    async fn books_delete(&self, id: i32) -> AppResult<()>;

    // -- membership --
    async fn members_list(&self) -> AppResult<Vec<Member>>;
    async fn members_get(&self, id: i32) -> AppResult<Member>;
    async fn members_find_by_name(&self, name: &str) -> AppResult<Option<Member>>;
    async fn members_create(&self, member: &NewMember) -> AppResult<Member>;
    /// Delete a member without open loans
    async fn members_delete(&self, id: i32) -> AppResult<()>;

    // -- loan ledger --
    async fn loans_get(&self, id: i32) -> AppResult<Loan>;
    /// Insert an open loan and mark the book borrowed
    async fn loans_open(&self, loan: &NewLoan) -> AppResult<Loan>;
    /// Close an open loan, charge its fee and mark the book available
    async fn loans_close(
        &self,
        id: i32,
        returned_on: NaiveDate,
        policy: &LateFeePolicy,
    ) -> AppResult<(Loan, LateFee)>;
    async fn loans_history(&self) -> AppResult<Vec<LoanDetails>>;
    async fn loans_open_list(&self) -> AppResult<Vec<LoanDetails>>;
    async fn loans_open_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>>;
}

/// PostgreSQL-backed repository holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub members: members::MembersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Map a unique-constraint violation to `Conflict`, pass anything else through
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

#[async_trait]
impl LibraryStore for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn books_search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.books.search(query).await
    }

    async fn books_available(&self) -> AppResult<Vec<Book>> {
        self.books.available().await
    }

    async fn books_pending(&self) -> AppResult<Vec<Book>> {
        self.books.pending().await
    }

    async fn books_get(&self, id: i32) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    async fn books_code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        self.books.code_exists(code, exclude_id).await
    }

    async fn books_create(&self, book: &NewBook) -> AppResult<Book> {
        self.books.create(book).await
    }

    async fn books_update(&self, id: i32, changes: &UpdateBook) -> AppResult<Book> {
        self.books.update(id, changes).await
    }

    async fn books_approve(&self, id: i32) -> AppResult<Book> {
        self.books.approve(id).await
    }

    async fn books_reject(&self, id: i32) -> AppResult<()> {
        self.books.reject(id).await
    }

    async fn books_delete(&self, id: i32) -> AppResult<()> {
        self.books.delete(id).await
    }

    async fn members_list(&self) -> AppResult<Vec<Member>> {
        self.members.list().await
    }

    async fn members_get(&self, id: i32) -> AppResult<Member> {
        self.members.get_by_id(id).await
    }

    async fn members_find_by_name(&self, name: &str) -> AppResult<Option<Member>> {
        self.members.find_by_name(name).await
    }

    async fn members_create(&self, member: &NewMember) -> AppResult<Member> {
        self.members.create(member).await
    }

    async fn members_delete(&self, id: i32) -> AppResult<()> {
        self.members.delete(id).await
    }

    async fn loans_get(&self, id: i32) -> AppResult<Loan> {
        self.loans.get_by_id(id).await
    }

    async fn loans_open(&self, loan: &NewLoan) -> AppResult<Loan> {
        self.loans.open(loan).await
    }

    async fn loans_close(
        &self,
        id: i32,
        returned_on: NaiveDate,
        policy: &LateFeePolicy,
    ) -> AppResult<(Loan, LateFee)> {
        self.loans.close(id, returned_on, policy).await
    }

    async fn loans_history(&self) -> AppResult<Vec<LoanDetails>> {
        self.loans.history().await
    }

    async fn loans_open_list(&self) -> AppResult<Vec<LoanDetails>> {
        self.loans.open_loans(None).await
    }

    async fn loans_open_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.loans.open_loans(Some(member_id)).await
    }
}
