//! Session/revocation registry for refresh tokens.
//!
//! A refresh token is honoured only while its `jti` is recorded here and
//! unexpired. Backends treat expired entries as absent on lookup and drop
//! them for good on [`SessionRegistry::purge_expired`].

mod memory;
mod redis_registry;

use async_trait::async_trait;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::domain::RefreshSession;
use crate::errors::AppResult;

pub use self::memory::InMemorySessionRegistry;
pub use self::redis_registry::RedisSessionRegistry;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Record a freshly issued refresh token.
    async fn record(&self, session: &RefreshSession) -> AppResult<()>;

    /// Whether the token id is recorded and unexpired.
    async fn is_active(&self, token_id: Uuid) -> AppResult<bool>;

    /// Remove the token id. Returns `true` only for the caller that removed
    /// an active session; unknown or already revoked ids return `false`.
    async fn revoke(&self, token_id: Uuid) -> AppResult<bool>;

    /// Revoke every session belonging to the user, returning how many
    /// active sessions were removed.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> AppResult<u64>;

    /// Number of active sessions.
    async fn active_count(&self) -> AppResult<u64>;

    /// Check the backend is reachable.
    async fn ping(&self) -> AppResult<()>;
}
