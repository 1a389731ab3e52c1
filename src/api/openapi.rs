//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, borrows, categories, health, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library Management System REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::register,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Borrows
        borrows::request_borrow,
        borrows::list_borrows,
        borrows::get_borrow,
        borrows::update_borrow,
        borrows::delete_borrow,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::get_user_borrows,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            crate::models::user::RegisterUser,
            // Catalog
            crate::models::book::Book,
            crate::models::book::Inventory,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::author::Author,
            crate::models::author::CreateAuthor,
            crate::models::author::UpdateAuthor,
            crate::models::category::Category,
            crate::models::category::CreateCategory,
            crate::models::category::UpdateCategory,
            // Borrows
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BookBorrow,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::CreateBorrow,
            crate::models::borrow::UpdateBorrowStatus,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            // Stats
            crate::services::stats::LibraryStats,
            crate::services::stats::InventoryStats,
            crate::services::stats::BorrowStats,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorType,
            crate::error::ErrorBody,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog titles and inventory"),
        (name = "authors", description = "Author management"),
        (name = "categories", description = "Category management"),
        (name = "borrows", description = "Borrow lifecycle"),
        (name = "users", description = "User management"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
