//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, members};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Server API",
        version = "1.0.0",
        description = "Catalog, membership and circulation REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::available_books,
        books::pending_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::approve_book,
        books::reject_book,
        // Members
        members::list_members,
        members::create_member,
        members::login,
        members::get_member,
        members::delete_member,
        members::member_loans,
        // Loans
        loans::create_loan,
        loans::list_loans,
        loans::open_loans,
        loans::return_loan,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::Approval,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookCreated,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::MemberLogin,
            members::LoginResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::BorrowRequest,
            crate::models::loan::ReturnRequest,
            crate::models::loan::BorrowReceipt,
            crate::models::loan::ReturnReceipt,
            // Shared
            crate::api::ActionResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog and approval queue"),
        (name = "members", description = "Member registry"),
        (name = "loans", description = "Borrowing and returns")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
