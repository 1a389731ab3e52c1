//! Category endpoints

use axum::extract::State;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::category::{Category, CreateCategory, UpdateCategory},
    AppState,
};

use super::{ApiJson, ApiPath, ApiResponse, AuthenticatedUser};

#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All categories", body = Vec<Category>))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<ApiResponse<Vec<Category>>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(ApiResponse::ok(
        "CATEGORIES_LISTED",
        format!("{} categories", categories.len()),
        categories,
    ))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Category>> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(ApiResponse::ok("CATEGORY_FOUND", "Category", category))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 409, description = "Name already used", body = ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(category): ApiJson<CreateCategory>,
) -> AppResult<ApiResponse<Category>> {
    claims.require_staff()?;

    let created = state.services.catalog.create_category(category).await?;
    Ok(ApiResponse::created("CATEGORY_CREATED", "Category created", created))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategory,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Name already used", body = ErrorResponse)
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(category): ApiJson<UpdateCategory>,
) -> AppResult<ApiResponse<Category>> {
    claims.require_staff()?;

    let updated = state.services.catalog.update_category(id, category).await?;
    Ok(ApiResponse::ok("CATEGORY_UPDATED", "Category updated", updated))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category still referenced by books", body = ErrorResponse)
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    claims.require_staff()?;

    state.services.catalog.delete_category(id).await?;
    Ok(ApiResponse::ok("CATEGORY_DELETED", "Category deleted", ()))
}
