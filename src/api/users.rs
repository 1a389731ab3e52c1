//! User management endpoints

use axum::extract::State;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        borrow::{BorrowDetails, BorrowQuery},
        user::{CreateUser, UpdateUser, User, UserQuery, UserShort},
    },
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, PaginatedResponse};

/// List users with search and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = Vec<UserShort>),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> AppResult<ApiResponse<PaginatedResponse<UserShort>>> {
    claims.require_staff()?;

    let (users, total) = state.services.users.search_users(&query).await?;

    Ok(ApiResponse::ok(
        "USERS_LISTED",
        format!("{} user(s)", total),
        PaginatedResponse::new(users, total, query.page, query.per_page),
    ))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<User>> {
    claims.require_self_or_staff(id)?;

    let user = state.services.users.get_by_id(id).await?;
    Ok(ApiResponse::ok("USER_FOUND", "User details", user))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Login already taken", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(user): ApiJson<CreateUser>,
) -> AppResult<ApiResponse<User>> {
    claims.require_admin()?;

    let created = state.services.users.create_user(user).await?;
    Ok(ApiResponse::created("USER_CREATED", "User created", created))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(user): ApiJson<UpdateUser>,
) -> AppResult<ApiResponse<User>> {
    claims.require_admin()?;

    let updated = state.services.users.update_user(id, user).await?;
    Ok(ApiResponse::ok("USER_UPDATED", "User updated", updated))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteUserQuery {
    /// Delete even while the user holds borrowed books
    pub force: Option<bool>,
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID"), DeleteUserQuery),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User still holds borrowed books", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteUserQuery>,
) -> AppResult<ApiResponse<()>> {
    claims.require_admin()?;

    state
        .services
        .users
        .delete_user(&claims, id, query.force.unwrap_or(false))
        .await?;
    Ok(ApiResponse::ok("USER_DELETED", "User deleted", ()))
}

/// Borrow records of a user
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID"), BorrowQuery),
    responses(
        (status = 200, description = "User's borrow records", body = Vec<BorrowDetails>),
        (status = 403, description = "Owner or staff only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(mut query): ApiQuery<BorrowQuery>,
) -> AppResult<ApiResponse<PaginatedResponse<BorrowDetails>>> {
    claims.require_self_or_staff(id)?;
    state.services.users.get_by_id(id).await?;

    query.user_id = Some(id);
    let (page, per_page) = (query.page, query.per_page);
    let (borrows, total) = state.services.borrows.list(&claims, query).await?;
    let items = borrows.into_iter().map(BorrowDetails::from).collect();

    Ok(ApiResponse::ok(
        "BORROWS_LISTED",
        format!("{} borrow record(s)", total),
        PaginatedResponse::new(items, total, page, per_page),
    ))
}
