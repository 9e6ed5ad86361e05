//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.

mod auth_service;
pub mod container;
mod token_service;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{AuthService, Authenticator, RefreshResponse, TokenResponse};
pub use token_service::{IssuedToken, TokenIssuer};
pub use user_service::{UserManager, UserService, UserStats};

#[cfg(test)]
pub use auth_service::MockAuthService;
#[cfg(test)]
pub use container::MockServiceContainer;
#[cfg(test)]
pub use user_service::MockUserService;
