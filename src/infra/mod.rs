//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - The credential store (in-memory or SeaORM)
//! - The refresh-session registry (in-memory or Redis)
//! - Timeout and retry policy for both

pub mod cache;
pub mod db;
pub mod repositories;
pub mod resilience;
pub mod sessions;

pub use cache::Cache;
pub use db::Database;
pub use repositories::{DatabaseUserStore, UserRepository, UserStore};
pub use resilience::StorePolicy;
pub use sessions::{InMemorySessionRegistry, RedisSessionRegistry, SessionRegistry};

#[cfg(test)]
pub use repositories::MockUserRepository;
#[cfg(test)]
pub use sessions::MockSessionRegistry;
