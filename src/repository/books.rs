//! Books repository for database operations

use sqlx::{Pool, Postgres};

use super::conflict_on_unique;
use crate::{
    error::{AppError, AppResult},
    models::book::{Approval, Book, BookQuery, BookStatus, NewBook, UpdateBook},
};

const DUPLICATE_CODE: &str = "A book with this code already exists";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search by code, title or publisher (case-insensitive substring)
    pub async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL
                   OR strpos(lower(code), $1) > 0
                   OR strpos(lower(title), $1) > 0
                   OR strpos(lower(COALESCE(publisher, '')), $1) > 0)
              AND ($2 OR approval = 'approved')
            ORDER BY intake_date DESC, code
            "#,
        )
        .bind(query.needle())
        .bind(query.include_pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Books a member can borrow right now
    pub async fn available(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE status = 'available' AND approval = 'approved' ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Books waiting for approval
    pub async fn pending(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE approval = 'pending' ORDER BY intake_date DESC, code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Check if a code is already used by another book
    pub async fn code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE code = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a new book
    pub async fn create(&self, book: &NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (code, title, publisher, year, intake_date, status, approval)
            VALUES ($1, $2, $3, $4, $5, 'available', $6)
            RETURNING *
            "#,
        )
        .bind(&book.code)
        .bind(&book.title)
        .bind(&book.publisher)
        .bind(book.year)
        .bind(book.intake_date)
        .bind(book.approval)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_CODE))
    }

    /// Apply a partial update. An approved book cannot go back to pending.
    pub async fn update(&self, id: i32, changes: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let current: Approval =
            sqlx::query_scalar("SELECT approval FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let approval = changes.approved.map(|approved| {
            if approved {
                Approval::Approved
            } else {
                Approval::Pending
            }
        });

        if current == Approval::Approved && approval == Some(Approval::Pending) {
            return Err(AppError::Conflict(
                "An approved book cannot return to pending".to_string(),
            ));
        }

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                code = COALESCE($2, code),
                title = COALESCE($3, title),
                publisher = COALESCE($4, publisher),
                year = COALESCE($5, year),
                intake_date = COALESCE($6, intake_date),
                approval = COALESCE($7, approval)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.code)
        .bind(&changes.title)
        .bind(&changes.publisher)
        .bind(changes.year)
        .bind(changes.intake_date)
        .bind(approval)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_CODE))?;

        tx.commit().await?;

        Ok(book)
    }

    /// Approve a pending book
    pub async fn approve(&self, id: i32) -> AppResult<Book> {
        let approved = sqlx::query_as::<_, Book>(
            "UPDATE books SET approval = 'approved' WHERE id = $1 AND approval = 'pending' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match approved {
            Some(book) => Ok(book),
            None => Err(self.not_pending(id).await),
        }
    }

    /// Reject (delete) a pending book, refused while it is on loan
    pub async fn reject(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let (approval, status): (Approval, BookStatus) =
            sqlx::query_as("SELECT approval, status FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if approval != Approval::Pending {
            return Err(AppError::Conflict(format!(
                "Book {} is not pending approval",
                id
            )));
        }
        if status == BookStatus::Borrowed {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be rejected".to_string(),
            ));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Delete a book, refused while it is on loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let status: BookStatus =
            sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if status == BookStatus::Borrowed {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Explain why an approval-gate action matched no pending row
    async fn not_pending(&self, id: i32) -> AppError {
        match self.get_by_id(id).await {
            Ok(_) => AppError::Conflict(format!("Book {} is not pending approval", id)),
            Err(e) => e,
        }
    }
}
