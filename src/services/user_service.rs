//! User service - Handles user-related business logic.
//!
//! Backs the admin endpoints: user listing, statistics and session cleanup.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::domain::{User, UserResponse};
use crate::errors::{AppError, AppResult};
use crate::infra::{SessionRegistry, StorePolicy, UserRepository};
use crate::types::{Paginated, PaginationParams};

/// Aggregate numbers for the admin dashboard
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStats {
    pub total_users: u64,
    pub admin_users: u64,
    pub active_sessions: u64,
}

/// User service trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// List users one page at a time
    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<UserResponse>>;

    /// User and session counts
    async fn stats(&self) -> AppResult<UserStats>;

    /// Drop expired refresh sessions now, returning how many went
    async fn purge_expired_sessions(&self) -> AppResult<u64>;
}

/// Concrete implementation of UserService.
pub struct UserManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRegistry>,
    policy: StorePolicy,
}

impl UserManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRegistry>,
        policy: StorePolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            policy,
        }
    }
}

#[async_trait]
impl UserService for UserManager {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.policy
            .run("users.find_by_id", || self.users.find_by_id(id))
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn list_users(&self, params: PaginationParams) -> AppResult<Paginated<UserResponse>> {
        let (users, total) = self
            .policy
            .run("users.list", || self.users.list(&params))
            .await?;

        Ok(Paginated::new(
            users.into_iter().map(UserResponse::from).collect(),
            params.page,
            params.limit(),
            total,
        ))
    }

    async fn stats(&self) -> AppResult<UserStats> {
        let ((total_users, admin_users), active_sessions) = tokio::try_join!(
            self.policy
                .run("users.count_by_role", || self.users.count_by_role()),
            self.policy
                .run("sessions.active_count", || self.sessions.active_count()),
        )?;

        Ok(UserStats {
            total_users,
            admin_users,
            active_sessions,
        })
    }

    async fn purge_expired_sessions(&self) -> AppResult<u64> {
        let purged = self
            .policy
            .run("sessions.purge_expired", || self.sessions.purge_expired())
            .await?;

        tracing::info!(purged, "Expired sessions purged");
        Ok(purged)
    }
}
