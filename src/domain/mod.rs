//! Domain layer - Core business entities and logic
//!
//! This module contains the core domain models that represent
//! business concepts independent of infrastructure concerns.

pub mod password;
pub mod session;
pub mod token;
pub mod user;

pub use password::{Password, PasswordHasher};
pub use session::RefreshSession;
pub use token::{Claims, TokenError, TokenType};
pub use user::{NewUser, User, UserResponse, UserRole};
