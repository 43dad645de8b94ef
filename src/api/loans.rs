//! Loan endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{BorrowReceipt, BorrowRequest, LoanDetails, ReturnReceipt, ReturnRequest},
};

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan opened", body = BorrowReceipt),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already borrowed or not approved", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    payload: Result<Json<BorrowRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<BorrowReceipt>)> {
    let Json(request) = payload?;
    let receipt = state.services.loans.borrow(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Full loan history
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "All loans, most recent first", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.history().await?;
    Ok(Json(loans))
}

/// Loans not yet returned
#[utoipa::path(
    get,
    path = "/loans/open",
    tag = "loans",
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanDetails>)
    )
)]
pub async fn open_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.open_loans().await?;
    Ok(Json(loans))
}

/// Return a borrowed book on the given calendar date
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnReceipt),
        (status = 400, description = "Missing or malformed date", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found or already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<ReturnRequest>, JsonRejection>,
) -> AppResult<Json<ReturnReceipt>> {
    let Path(loan_id) = path?;
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ReturnRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };

    let receipt = state.services.loans.return_loan(loan_id, request).await?;
    Ok(Json(receipt))
}
