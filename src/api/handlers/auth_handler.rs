//! Authentication handlers.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{auth_middleware, CurrentUser};
use crate::api::AppState;
use crate::domain::UserResponse;
use crate::errors::AppResult;
use crate::services::{RefreshResponse, TokenResponse};
use crate::types::NoContent;

/// Letters, digits, `.`, `_` and `-`
static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("username pattern is valid"));

/// User registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Login name, unique regardless of case
    #[validate(
        length(min = 3, max = 100, message = "must be 3 to 100 characters"),
        regex(path = *USERNAME_REGEX, message = "may only contain letters, digits, '.', '_' and '-'")
    )]
    #[schema(example = "alice")]
    pub username: String,
    /// Password
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    #[schema(example = "pw123")]
    pub password: String,
}

/// User login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100, message = "is required"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "is required"))]
    #[schema(example = "pw123")]
    pub password: String,
}

/// Request carrying a refresh token (refresh and logout)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

/// Result of logging out everywhere
#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutAllResponse {
    #[schema(example = "Logged out from all sessions")]
    pub message: String,
    /// Number of sessions that were still active
    pub revoked: u64,
}

/// Create authentication routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/me", get(me))
        .route("/logout-all", post(logout_all))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .merge(authenticated)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .auth_service
        .register(payload.username, payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Login and get an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state
        .auth_service
        .login(payload.username, payload.password)
        .await?;

    Ok(Json(tokens))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token (and rotated refresh token)", body = RefreshResponse),
        (status = 401, description = "Refresh token expired, revoked or invalid")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let tokens = state.auth_service.refresh(payload.refresh_token).await?;
    Ok(Json(tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Logged out (also when already logged out)"),
        (status = 401, description = "Token is not authentic")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> AppResult<NoContent> {
    state.auth_service.logout(payload.refresh_token).await?;
    Ok(NoContent)
}

/// Revoke every refresh token of the caller
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = LogoutAllResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<LogoutAllResponse>> {
    let revoked = state.auth_service.logout_all(current_user.id).await?;

    Ok(Json(LogoutAllResponse {
        message: "Logged out from all sessions".to_string(),
        revoked,
    }))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth_service.current_user(current_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}
