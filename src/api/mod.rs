//! API handlers for Libris REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod health;
pub mod openapi;
pub mod stats;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::paginate, models::user::UserClaims, AppState};

/// Header carrying the client API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|e| AppError::Authentication(e.to_string()))?;

        let claims = UserClaims::from_token(bearer.token(), &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// JSON body extractor that rejects with the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor; a malformed id is a 400 in the error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `success` object of the response envelope
#[derive(Debug, Serialize)]
pub struct SuccessBody {
    #[serde(rename = "type")]
    pub success_type: &'static str,
    pub message: String,
}

/// Success response envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub success: SuccessBody,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, success_type: &'static str, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            success: SuccessBody {
                success_type,
                message: message.into(),
            },
            data,
        }
    }

    pub fn ok(success_type: &'static str, message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, success_type, message, data)
    }

    pub fn created(success_type: &'static str, message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, success_type, message, data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Paginated list payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let (page, per_page, _) = paginate(page, per_page);
        Self { items, total, page, per_page }
    }
}

/// Reject requests without a configured `X-API-Key`. No-op when no keys
/// are configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api = &state.config.api;
    if api.is_enabled() {
        let key = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing API key".to_string()))?;

        if !api.accepts(key) {
            tracing::warn!("Request rejected: unknown API key");
            return Err(AppError::Authentication("Invalid API key".to_string()));
        }
    }

    Ok(next.run(request).await)
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/borrows", get(borrows::list_borrows).post(borrows::request_borrow))
        .route(
            "/borrows/:id",
            get(borrows::get_borrow)
                .put(borrows::update_borrow)
                .delete(borrows::delete_borrow),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/borrows", get(users::get_user_borrows))
        .route("/stats", get(stats::get_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let api_v1 = Router::new().merge(public).merge(protected).with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
