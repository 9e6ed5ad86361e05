//! HTTP request handlers.

pub mod auth_handler;
pub mod health_handler;
pub mod protected_handler;

pub use auth_handler::auth_routes;
pub use health_handler::health;
pub use protected_handler::protected_routes;
