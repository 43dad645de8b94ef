//! Member registry endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        member::{CreateMember, Member, MemberLogin},
    },
};

use super::ActionResponse;

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub member: Member,
    /// True when the name was unknown and a member was registered
    pub created: bool,
}

/// List all members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    responses(
        (status = 200, description = "Members, most recent first", body = Vec<Member>)
    )
)]
pub async fn list_members(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list().await?;
    Ok(Json(members))
}

/// Register a member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member registered", body = Member),
        (status = 400, description = "Missing name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    payload: Result<Json<CreateMember>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let Json(member) = payload?;
    let member = state.services.members.register(member).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Find a member by name, registering it when unknown
#[utoipa::path(
    post,
    path = "/members/login",
    tag = "members",
    request_body = MemberLogin,
    responses(
        (status = 200, description = "Existing member", body = LoginResponse),
        (status = 201, description = "New member registered", body = LoginResponse),
        (status = 400, description = "Missing name", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    payload: Result<Json<MemberLogin>, JsonRejection>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let Json(login) = payload?;
    let (member, created) = state.services.members.login(login).await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(LoginResponse { member, created })))
}

/// Get a member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Member>> {
    let Path(id) = path?;
    let member = state.services.members.get(id).await?;
    Ok(Json(member))
}

/// Delete a member without open loans
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member deleted", body = ActionResponse),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Member still holds a book", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ActionResponse>> {
    let Path(id) = path?;
    let id = state.services.members.delete(id).await?;
    Ok(Json(ActionResponse {
        id,
        message: "Member deleted".to_string(),
    }))
}

/// Open loans held by a member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member's open loans", body = Vec<LoanDetails>),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn member_loans(
    State(state): State<crate::AppState>,
    path: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let Path(id) = path?;
    let loans = state.services.members.open_loans(id).await?;
    Ok(Json(loans))
}
