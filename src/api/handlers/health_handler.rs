//! Health check.

use std::future::Future;

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::errors::AppResult;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub services: ServiceHealth,
}

/// Individual backend health
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceHealth {
    pub users: ServiceStatus,
    pub sessions: ServiceStatus,
}

/// Service status
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceStatus {
    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Ping one backend under the store policy so a stalled backend cannot
/// hold the request open.
async fn check<F, Fut>(state: &AppState, operation: &'static str, ping: F) -> ServiceStatus
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    match state.store_policy.run(operation, ping).await {
        Ok(()) => ServiceStatus {
            status: "healthy".to_string(),
            error: None,
        },
        Err(e) => {
            tracing::error!(operation, error = %e, "Health check failed");
            ServiceStatus {
                status: "unhealthy".to_string(),
                error: Some(e.user_message()),
            }
        }
    }
}

/// Health check with credential store and session registry connectivity
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "All backends reachable", body = HealthResponse),
        (status = 503, description = "A backend is unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (users, sessions) = tokio::join!(
        check(&state, "users.ping", || state.users.ping()),
        check(&state, "sessions.ping", || state.sessions.ping()),
    );

    let healthy = users.is_healthy() && sessions.is_healthy();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        services: ServiceHealth { users, sessions },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
