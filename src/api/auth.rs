//! Authentication endpoints

use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppResult, ErrorResponse},
    models::user::{RegisterUser, User},
    AppState,
};

use super::{ApiJson, ApiResponse, AuthenticatedUser};

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Login response with JWT token
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Lifetime of the token in seconds
    pub expires_in: u64,
    pub user: User,
}

/// Log in with login and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let (token, user) = state
        .services
        .users
        .authenticate(&request.login, &request.password)
        .await?;

    Ok(ApiResponse::ok(
        "LOGGED_IN",
        "Login successful",
        LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.auth.jwt_expiration_hours * 3600,
            user,
        },
    ))
}

/// Register a new member account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Login already taken", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterUser>,
) -> AppResult<ApiResponse<User>> {
    let user = state.services.users.register(request).await?;
    Ok(ApiResponse::created("USER_REGISTERED", "Account created", user))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse<User>> {
    let user = state.services.users.get_by_id(claims.user_id).await?;
    Ok(ApiResponse::ok("CURRENT_USER", "Current user", user))
}
