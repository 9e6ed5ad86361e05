//! CLI module - Command-line interface for the application.
//!
//! Provides commands for:
//! - `serve` - Start the HTTP server
//! - `hash-password` - Hash a password with the configured Argon2 parameters

pub mod args;

pub use args::{Cli, Commands};
