//! Auth Gateway - token-based authentication service
//!
//! Register, login, refresh and logout over HTTP, with short-lived access
//! tokens, revocable refresh tokens and role-gated routes.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Users, passwords, token claims and refresh sessions
//! - **services**: Token issuance and the authentication use cases
//! - **infra**: Credential stores (memory or SeaORM), session registries, retry policy
//! - **api**: HTTP handlers, middleware, and routes
//! - **jobs**: Background session sweeper
//! - **types**: Shared types (pagination, responses)
//! - **utils**: Clock abstraction
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Apply database migrations
//! cargo run -- migrate up
//!
//! # Hash a password
//! cargo run -- hash-password 's3cret'
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Password, User, UserRole};
pub use errors::{AppError, AppResult};
