//! Statistics endpoints

use axum::extract::State;

use crate::{
    error::{AppResult, ErrorResponse},
    services::stats::LibraryStats,
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// Library-wide inventory and borrow counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = LibraryStats),
        (status = 403, description = "Staff only", body = ErrorResponse)
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse<LibraryStats>> {
    claims.require_staff()?;

    let stats = state.services.stats.get_stats().await?;
    Ok(ApiResponse::ok("STATS", "Library statistics", stats))
}
