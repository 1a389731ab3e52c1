//! Borrow lifecycle endpoints

use axum::extract::State;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::borrow::{BorrowDetails, BorrowQuery, BorrowStatus, CreateBorrow, UpdateBorrowStatus},
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, PaginatedResponse};

/// Request a borrow
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Borrow requested", body = BorrowDetails),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "Book unavailable or duplicate request", body = ErrorResponse)
    )
)]
pub async fn request_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<CreateBorrow>,
) -> AppResult<ApiResponse<BorrowDetails>> {
    let borrow = state.services.borrows.request(&claims, request).await?;
    Ok(ApiResponse::created(
        "BORROW_REQUESTED",
        "Borrow request created",
        borrow.into(),
    ))
}

/// List borrow records
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Page of borrow records", body = Vec<BorrowDetails>),
        (status = 403, description = "Not allowed to list another user's records", body = ErrorResponse)
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<BorrowQuery>,
) -> AppResult<ApiResponse<PaginatedResponse<BorrowDetails>>> {
    let (page, per_page) = (query.page, query.per_page);
    let (borrows, total) = state.services.borrows.list(&claims, query).await?;

    let items = borrows.into_iter().map(BorrowDetails::from).collect();

    Ok(ApiResponse::ok(
        "BORROWS_LISTED",
        format!("{} borrow record(s)", total),
        PaginatedResponse::new(items, total, page, per_page),
    ))
}

/// Get a borrow record
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow record", body = BorrowDetails),
        (status = 404, description = "Borrow not found", body = ErrorResponse)
    )
)]
pub async fn get_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<BorrowDetails>> {
    let borrow = state.services.borrows.get(&claims, id).await?;
    Ok(ApiResponse::ok("BORROW_FOUND", "Borrow record", borrow.into()))
}

/// Accept a pending request or return a borrowed book
#[utoipa::path(
    put,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Borrow ID")),
    request_body = UpdateBorrowStatus,
    responses(
        (status = 200, description = "Status updated", body = BorrowDetails),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Borrow not found", body = ErrorResponse),
        (status = 409, description = "Invalid transition or book unavailable", body = ErrorResponse)
    )
)]
pub async fn update_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateBorrowStatus>,
) -> AppResult<ApiResponse<BorrowDetails>> {
    let borrow = state.services.borrows.update_status(&claims, id, update).await?;

    let (success_type, message) = match borrow.borrow_status {
        BorrowStatus::Borrowed => ("BORROW_ACCEPTED", "Borrow accepted"),
        _ => ("BOOK_RETURNED", "Book returned"),
    };

    Ok(ApiResponse::ok(success_type, message, borrow.into()))
}

/// Cancel a pending request or remove a returned record
#[utoipa::path(
    delete,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow record deleted"),
        (status = 404, description = "Borrow not found", body = ErrorResponse),
        (status = 409, description = "Book is still borrowed", body = ErrorResponse)
    )
)]
pub async fn delete_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    state.services.borrows.delete(&claims, id).await?;
    Ok(ApiResponse::ok("BORROW_DELETED", "Borrow record deleted", ()))
}
