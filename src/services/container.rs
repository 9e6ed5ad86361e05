//! Service Container - Centralized service access.
//!
//! Wires the token issuer, password hasher and backing stores into the
//! services handlers talk to.

use std::sync::Arc;

use super::{AuthService, Authenticator, TokenIssuer, UserManager, UserService};
use crate::config::Config;
use crate::domain::PasswordHasher;
use crate::errors::AppResult;
use crate::infra::{SessionRegistry, UserRepository};
use crate::utils::Clock;

#[cfg(test)]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(test, automock)]
pub trait ServiceContainer: Send + Sync {
    /// Get authentication service
    fn auth(&self) -> Arc<dyn AuthService>;

    /// Get user service
    fn users(&self) -> Arc<dyn UserService>;

    /// Get the credential store (health checks)
    fn user_store(&self) -> Arc<dyn UserRepository>;

    /// Get the session registry (health checks)
    fn sessions(&self) -> Arc<dyn SessionRegistry>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRegistry>,
}

impl Services {
    /// Create a container from already-built services
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRegistry>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            users,
            sessions,
        }
    }

    /// Build every service over the given stores
    pub fn from_stores(
        config: &Config,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let hasher = PasswordHasher::new(config.password.params.clone())?;
        let tokens = Arc::new(TokenIssuer::new(config.token.clone(), clock.clone()));

        let auth_service = Arc::new(Authenticator::new(
            users.clone(),
            sessions.clone(),
            tokens,
            hasher,
            config.store_policy.clone(),
            clock,
            config.refresh_rotation,
            config.password.min_length,
        ));
        let user_service = Arc::new(UserManager::new(
            users.clone(),
            sessions.clone(),
            config.store_policy.clone(),
        ));

        Ok(Self::new(auth_service, user_service, users, sessions))
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    fn user_store(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn sessions(&self) -> Arc<dyn SessionRegistry> {
        self.sessions.clone()
    }
}
