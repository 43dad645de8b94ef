//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use super::{non_blank, today};
use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::book::{Approval, Book, BookQuery, CreateBook, NewBook, Submitter, UpdateBook},
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LibraryStore>,
    config: LibraryConfig,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LibraryStore>, config: LibraryConfig) -> Self {
        Self { store, config }
    }

    /// Approval state given to a new entry from `submitter`
    pub fn approval_for(&self, submitter: Submitter) -> Approval {
        match submitter {
            Submitter::Librarian => Approval::Approved,
            Submitter::Visitor if !self.config.approval_gate_enabled => Approval::Approved,
            Submitter::Visitor => Approval::Pending,
        }
    }

    /// Search the catalog. Visitors never see pending entries.
    pub async fn search(&self, q: Option<String>, viewer: Submitter) -> AppResult<Vec<Book>> {
        let query = BookQuery {
            q,
            include_pending: viewer == Submitter::Librarian,
        };
        self.store.books_search(&query).await
    }

    /// Books that can be borrowed now, ordered by code
    pub async fn available(&self) -> AppResult<Vec<Book>> {
        self.store.books_available().await
    }

    /// Entries waiting for a librarian decision
    pub async fn pending(&self) -> AppResult<Vec<Book>> {
        self.store.books_pending().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.store.books_get(id).await
    }

    /// Add a book to the catalog
    pub async fn submit(&self, book: CreateBook, submitter: Submitter) -> AppResult<Book> {
        book.validate()?;

        let code = book.code.trim().to_string();
        if self.store.books_code_exists(&code, None).await? {
            return Err(AppError::Conflict(
                "A book with this code already exists".to_string(),
            ));
        }

        let new_book = NewBook {
            code,
            title: book.title.trim().to_string(),
            publisher: non_blank(book.publisher.as_deref()),
            year: book.year,
            intake_date: book.intake_date.unwrap_or_else(today),
            approval: self.approval_for(submitter),
        };

        let created = self.store.books_create(&new_book).await?;
        tracing::info!(
            book_id = created.id,
            code = %created.code,
            approval = ?created.approval,
            "Book added to catalog"
        );
        Ok(created)
    }

    /// Partially update a book
    pub async fn update(&self, id: i32, mut changes: UpdateBook) -> AppResult<Book> {
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        if let Some(code) = changes.code.take() {
            let code = non_blank(Some(code.as_str()))
                .ok_or_else(|| AppError::Validation("book code cannot be blank".to_string()))?;
            if self.store.books_code_exists(&code, Some(id)).await? {
                return Err(AppError::Conflict(
                    "A book with this code already exists".to_string(),
                ));
            }
            changes.code = Some(code);
        }
        if let Some(title) = changes.title.take() {
            let title = non_blank(Some(title.as_str()))
                .ok_or_else(|| AppError::Validation("book title cannot be blank".to_string()))?;
            changes.title = Some(title);
        }

        let book = self.store.books_update(id, &changes).await?;
        tracing::info!(book_id = id, "Book updated");
        Ok(book)
    }

    /// pending -> approved
    pub async fn approve(&self, id: i32) -> AppResult<Book> {
        let book = self.store.books_approve(id).await?;
        tracing::info!(book_id = id, code = %book.code, "Book approved");
        Ok(book)
    }

    /// pending -> deleted
    pub async fn reject(&self, id: i32) -> AppResult<i32> {
        self.store.books_reject(id).await?;
        tracing::info!(book_id = id, "Pending book rejected");
        Ok(id)
    }

    /// Remove a book that is not on loan
    pub async fn delete(&self, id: i32) -> AppResult<i32> {
        self.store.books_delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(id)
    }
}
