//! Protected resource handlers.
//!
//! Every route here sits behind [`auth_middleware`]; the `/admin` ones are
//! additionally gated by [`admin_middleware`].

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::{admin_middleware, auth_middleware, CurrentUser};
use crate::api::AppState;
use crate::domain::{UserResponse, UserRole};
use crate::errors::AppResult;
use crate::services::UserStats;
use crate::types::{Paginated, PaginationParams};

/// Greeting returned by the basic protected route
#[derive(Debug, Serialize, ToSchema)]
pub struct ProtectedResponse {
    pub message: String,
    pub user: ProtectedUser,
    pub timestamp: DateTime<Utc>,
}

/// Identity as read from the access token
#[derive(Debug, Serialize, ToSchema)]
pub struct ProtectedUser {
    pub id: Uuid,
    pub role: UserRole,
}

/// Result of an on-demand session sweep
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub message: String,
    pub purged: u64,
}

const PREFIX: &str = "/api/v1/protected";

/// Create protected routes. Paths are absolute so the bare prefix and the
/// prefix with a trailing slash both reach the greeting.
pub fn protected_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route(&format!("{PREFIX}/admin/users"), get(list_users))
        .route(&format!("{PREFIX}/admin/users/:user_id"), get(get_user))
        .route(&format!("{PREFIX}/admin/stats"), get(stats))
        .route(&format!("{PREFIX}/admin/cleanup"), post(cleanup))
        .route_layer(middleware::from_fn(admin_middleware));

    // The auth layer wraps the admin gate, so it always runs first
    Router::new()
        .route(PREFIX, get(protected))
        .route(&format!("{PREFIX}/"), get(protected))
        .route(&format!("{PREFIX}/profile"), get(profile))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Any authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/protected/",
    tag = "Protected",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller is authenticated", body = ProtectedResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn protected(Extension(current_user): Extension<CurrentUser>) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "You have access to this protected resource".to_string(),
        user: ProtectedUser {
            id: current_user.id,
            role: current_user.role,
        },
        timestamp: Utc::now(),
    })
}

/// The caller's stored profile
#[utoipa::path(
    get,
    path = "/api/v1/protected/profile",
    tag = "Protected",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn profile(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth_service.current_user(current_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// List users (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/protected/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number, starting at 1"),
        ("per_page" = Option<u64>, Query, description = "Page size, capped at 100")
    ),
    responses(
        (status = 200, description = "One page of users"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    let users = state.user_service.list_users(params).await?;
    Ok(Json(users))
}

/// Look up one user (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/protected/admin/users/{user_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.user_service.get_user(user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// User and session counts (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/protected/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counts", body = UserStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<UserStats>> {
    Ok(Json(state.user_service.stats().await?))
}

/// Purge expired refresh sessions now (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/protected/admin/cleanup",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep finished", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn cleanup(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<CleanupResponse>> {
    let purged = state.user_service.purge_expired_sessions().await?;
    tracing::info!(user_id = %current_user.id, purged, "Admin triggered session cleanup");

    Ok(Json(CleanupResponse {
        message: format!("Purged {} expired sessions", purged),
        purged,
    }))
}
