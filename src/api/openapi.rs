//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{auth_handler, health_handler, protected_handler};
use crate::domain::{UserResponse, UserRole};
use crate::services::{RefreshResponse, TokenResponse, UserStats};

/// OpenAPI documentation for the auth gateway
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Auth Gateway",
        version = "0.1.0",
        description = "Token-based authentication: register, login, refresh, logout and role-gated routes",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Authentication endpoints
        auth_handler::register,
        auth_handler::login,
        auth_handler::refresh,
        auth_handler::logout,
        auth_handler::logout_all,
        auth_handler::me,
        // Protected endpoints
        protected_handler::protected,
        protected_handler::profile,
        protected_handler::list_users,
        protected_handler::get_user,
        protected_handler::stats,
        protected_handler::cleanup,
        // Health
        health_handler::health,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            // Auth types
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::RefreshRequest,
            auth_handler::LogoutAllResponse,
            TokenResponse,
            RefreshResponse,
            // Protected types
            protected_handler::ProtectedResponse,
            protected_handler::ProtectedUser,
            protected_handler::CleanupResponse,
            UserStats,
            // Health types
            health_handler::HealthResponse,
            health_handler::ServiceHealth,
            health_handler::ServiceStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token lifecycle"),
        (name = "Protected", description = "Routes for any authenticated user"),
        (name = "Admin", description = "Routes for administrators"),
        (name = "Health", description = "Liveness and backend reachability")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
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
                        .description(Some("Access token obtained from /api/v1/auth/login"))
                        .build(),
                ),
            );
        }
    }
}
