//! API handlers for the REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod members;
pub mod openapi;

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Query,
    },
    http::request::Parts,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::book::Submitter, AppState};

/// Who is calling, taken from the `admin` query flag.
///
/// `?admin=1` (or `true`) selects the librarian path; anything else is a
/// visitor. There is no authentication behind it.
pub struct Caller(pub Submitter);

#[derive(Deserialize)]
struct AdminFlag {
    admin: Option<String>,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(flag) = Query::<AdminFlag>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let submitter = match flag.admin.as_deref() {
            Some("1") | Some("true") => Submitter::Librarian,
            _ => Submitter::Visitor,
        };
        Ok(Caller(submitter))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Acknowledgement for actions that remove or act on a record
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub id: i32,
    pub message: String,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/available", get(books::available_books))
        .route("/books/pending", get(books::pending_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/approve", post(books::approve_book))
        .route("/books/:id/reject", post(books::reject_book))
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route("/members/login", post(members::login))
        .route(
            "/members/:id",
            get(members::get_member).delete(members::delete_member),
        )
        .route("/members/:id/loans", get(members::member_loans))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/open", get(loans::open_loans))
        .route("/loans/:id/return", post(loans::return_loan))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
