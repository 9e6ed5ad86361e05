//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::config::{Config, CorsOrigins};
use crate::errors::AppResult;
use crate::infra::{
    InMemorySessionRegistry, SessionRegistry, StorePolicy, UserRepository, UserStore,
};
use crate::services::{AuthService, ServiceContainer, Services, UserService};
use crate::utils::Clock;

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth_service: Arc<dyn AuthService>,
    /// User service
    pub user_service: Arc<dyn UserService>,
    /// Credential store
    pub users: Arc<dyn UserRepository>,
    /// Refresh-session registry
    pub sessions: Arc<dyn SessionRegistry>,
    /// Timeout and retry applied to direct store calls (health checks)
    pub store_policy: StorePolicy,
    /// Allowed CORS origins
    pub cors_origins: CorsOrigins,
}

impl AppState {
    /// Create application state over the given stores.
    pub fn from_config(
        config: &Config,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let container = Services::from_stores(config, users, sessions, clock)?;
        Ok(Self::from_container(&container, config))
    }

    /// Create application state backed entirely by process memory.
    pub fn in_memory(config: &Config, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let users = Arc::new(UserStore::new(clock.clone()));
        let sessions = Arc::new(InMemorySessionRegistry::new(clock.clone()));
        Self::from_config(config, users, sessions, clock)
    }

    /// Create application state from any service container.
    pub fn from_container(container: &dyn ServiceContainer, config: &Config) -> Self {
        Self {
            auth_service: container.auth(),
            user_service: container.users(),
            users: container.user_store(),
            sessions: container.sessions(),
            store_policy: config.store_policy.clone(),
            cors_origins: config.cors_origins.clone(),
        }
    }
}
