//! Author endpoints

use axum::extract::State;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(AuthorQuery),
    responses((status = 200, description = "Page of authors", body = Vec<Author>))
)]
pub async fn list_authors(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<AuthorQuery>,
) -> AppResult<ApiResponse<PaginatedResponse<Author>>> {
    let (authors, total) = state.services.catalog.search_authors(&query).await?;

    Ok(ApiResponse::ok(
        "AUTHORS_LISTED",
        format!("{} author(s)", total),
        PaginatedResponse::new(authors, total, query.page, query.per_page),
    ))
}

#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author", body = Author),
        (status = 404, description = "Author not found", body = ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Author>> {
    let author = state.services.catalog.get_author(id).await?;
    Ok(ApiResponse::ok("AUTHOR_FOUND", "Author", author))
}

#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = CreateAuthor,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(author): ApiJson<CreateAuthor>,
) -> AppResult<ApiResponse<Author>> {
    claims.require_staff()?;

    let created = state.services.catalog.create_author(author).await?;
    Ok(ApiResponse::created("AUTHOR_CREATED", "Author created", created))
}

#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Author ID")),
    request_body = UpdateAuthor,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found", body = ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(author): ApiJson<UpdateAuthor>,
) -> AppResult<ApiResponse<Author>> {
    claims.require_staff()?;

    let updated = state.services.catalog.update_author(id, author).await?;
    Ok(ApiResponse::ok("AUTHOR_UPDATED", "Author updated", updated))
}

#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Author ID")),
    responses(
        (status = 200, description = "Author deleted"),
        (status = 404, description = "Author not found", body = ErrorResponse),
        (status = 409, description = "Author still referenced by books", body = ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    claims.require_staff()?;

    state.services.catalog.delete_author(id).await?;
    Ok(ApiResponse::ok("AUTHOR_DELETED", "Author deleted", ()))
}
