use axum::{http::StatusCode, response::IntoResponse};

/// No content response helper (logout and other fire-and-forget endpoints)
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> axum::response::Response {
        StatusCode::NO_CONTENT.into_response()
    }
}
