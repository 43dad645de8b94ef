//! Catalog endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::book::{Approval, Book, CreateBook, UpdateBook},
};

use super::{ActionResponse, Caller};

/// Catalog search parameters
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive substring of code, title or publisher
    pub q: Option<String>,
}

/// Submission response
#[derive(Serialize, ToSchema)]
pub struct BookCreated {
    pub book: Book,
    pub message: String,
}

/// Search the catalog
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        SearchParams,
        ("admin" = Option<String>, Query, description = "`1` to include entries waiting for approval")
    ),
    responses(
        (status = 200, description = "Matching books, newest intake first", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Caller(viewer): Caller,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search(params.q, viewer).await?;
    Ok(Json(books))
}

/// Books that can be borrowed now
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    responses(
        (status = 200, description = "Approved books on the shelf", body = Vec<Book>)
    )
)]
pub async fn available_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.available().await?;
    Ok(Json(books))
}

/// Submissions waiting for a librarian
#[utoipa::path(
    get,
    path = "/books/pending",
    tag = "books",
    responses(
        (status = 200, description = "Pending books", body = Vec<Book>)
    )
)]
pub async fn pending_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.pending().await?;
    Ok(Json(books))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Book>> {
    let Path(id) = path?;
    let book = state.services.catalog.get(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
///
/// Librarian submissions (`?admin=1`) are approved at once; visitor
/// submissions wait in the pending queue while the approval gate is on.
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    params(
        ("admin" = Option<String>, Query, description = "`1` when submitted by a librarian")
    ),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookCreated),
        (status = 400, description = "Missing code or title", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate code", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Caller(submitter): Caller,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<BookCreated>)> {
    let Json(book) = payload?;
    let book = state.services.catalog.submit(book, submitter).await?;

    let message = match book.approval {
        Approval::Approved => "Book added to the catalog",
        Approval::Pending => "Book submitted, waiting for librarian approval",
    };

    Ok((
        StatusCode::CREATED,
        Json(BookCreated {
            book,
            message: message.to_string(),
        }),
    ))
}

/// Partially update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Nothing to update or blank field", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate code or approval reverted", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> AppResult<Json<Book>> {
    let Path(id) = path?;
    let Json(changes) = payload?;
    let book = state.services.catalog.update(id, changes).await?;
    Ok(Json(book))
}

/// Delete a book that is not on loan
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = ActionResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ActionResponse>> {
    let Path(id) = path?;
    let id = state.services.catalog.delete(id).await?;
    Ok(Json(ActionResponse {
        id,
        message: "Book deleted".to_string(),
    }))
}

/// Approve a pending submission
#[utoipa::path(
    post,
    path = "/books/{id}/approve",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book approved", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_book(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Book>> {
    let Path(id) = path?;
    let book = state.services.catalog.approve(id).await?;
    Ok(Json(book))
}

/// Reject (delete) a pending submission
#[utoipa::path(
    post,
    path = "/books/{id}/reject",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Submission rejected", body = ActionResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_book(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ActionResponse>> {
    let Path(id) = path?;
    let id = state.services.catalog.reject(id).await?;
    Ok(Json(ActionResponse {
        id,
        message: "Submission rejected".to_string(),
    }))
}
