//! Book catalog endpoints

use axum::extract::State;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, AuthenticatedUser, PaginatedResponse};

/// Search books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<ApiResponse<PaginatedResponse<Book>>> {
    let (books, total) = state.services.catalog.search_books(&query).await?;

    Ok(ApiResponse::ok(
        "BOOKS_LISTED",
        format!("{} book(s)", total),
        PaginatedResponse::new(books, total, query.page, query.per_page),
    ))
}

/// Get a book with its inventory counters
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(ApiResponse::ok("BOOK_FOUND", "Book details", book))
}

/// Add a title to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Author or category not found", body = ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(book): ApiJson<CreateBook>,
) -> AppResult<ApiResponse<Book>> {
    claims.require_staff()?;

    let created = state.services.catalog.create_book(book).await?;
    Ok(ApiResponse::created("BOOK_CREATED", "Book created", created))
}

/// Update a title; a new `amount` re-derives `available`
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "Amount lower than lent copies", body = ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(book): ApiJson<UpdateBook>,
) -> AppResult<ApiResponse<Book>> {
    claims.require_staff()?;

    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(ApiResponse::ok("BOOK_UPDATED", "Book updated", updated))
}

/// Remove a title that has no copy out on loan
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "Copies still on loan", body = ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    claims.require_staff()?;

    state.services.catalog.delete_book(id).await?;
    Ok(ApiResponse::ok("BOOK_DELETED", "Book deleted", ()))
}
