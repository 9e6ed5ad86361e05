use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::SessionRegistry;
use crate::config::{CACHE_PREFIX_SESSION, CACHE_PREFIX_USER_SESSIONS};
use crate::domain::RefreshSession;
use crate::errors::AppResult;
use crate::infra::Cache;
use crate::utils::Clock;

/// Registry shared by every instance pointed at the same Redis.
///
/// Each session lives under `session:{jti}` with a TTL equal to its
/// remaining lifetime, so Redis expires it on its own. `user_sessions:{id}`
/// indexes a user's token ids for logout-everywhere; members whose session
/// key has gone are pruned by [`SessionRegistry::purge_expired`].
pub struct RedisSessionRegistry {
    cache: Cache,
    clock: Arc<dyn Clock>,
}

impl RedisSessionRegistry {
    pub fn new(cache: Cache, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }
}

fn session_key(token_id: Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_SESSION, token_id)
}

fn user_key(user_id: Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_USER_SESSIONS, user_id)
}

#[async_trait]
impl SessionRegistry for RedisSessionRegistry {
    async fn record(&self, session: &RefreshSession) -> AppResult<()> {
        let remaining = (session.expires_at - self.clock.now()).num_seconds();
        if remaining <= 0 {
            return Ok(());
        }
        let ttl = remaining as u64;

        self.cache
            .set_with_ttl(&session_key(session.token_id), session, ttl)
            .await?;
        self.cache
            .add_to_set(&user_key(session.user_id), &session.token_id.to_string(), ttl)
            .await?;

        tracing::debug!(token_id = %session.token_id, user_id = %session.user_id, "Session recorded");
        Ok(())
    }

    async fn is_active(&self, token_id: Uuid) -> AppResult<bool> {
        let session: Option<RefreshSession> = self.cache.get(&session_key(token_id)).await?;
        let now = self.clock.now();
        Ok(session.is_some_and(|session| !session.is_expired(now)))
    }

    async fn revoke(&self, token_id: Uuid) -> AppResult<bool> {
        let Some(session) = self
            .cache
            .take::<RefreshSession>(&session_key(token_id))
            .await?
        else {
            return Ok(false);
        };

        self.cache
            .remove_from_set(&user_key(session.user_id), &[token_id.to_string()])
            .await?;

        let was_active = !session.is_expired(self.clock.now());
        if was_active {
            tracing::debug!(token_id = %token_id, "Session revoked");
        }
        Ok(was_active)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let index = user_key(user_id);
        let members = self.cache.set_members(&index).await?;

        let keys: Vec<String> = members
            .iter()
            .filter_map(|member| member.parse::<Uuid>().ok())
            .map(session_key)
            .collect();
        let revoked = self.cache.delete_many(&keys).await?;
        self.cache.remove_from_set(&index, &members).await?;

        Ok(revoked)
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let mut purged = 0;

        for index in self
            .cache
            .scan_keys(&format!("{}*", CACHE_PREFIX_USER_SESSIONS))
            .await?
        {
            let mut stale = Vec::new();
            for member in self.cache.set_members(&index).await? {
                let live = match member.parse::<Uuid>() {
                    Ok(token_id) => self.cache.exists(&session_key(token_id)).await?,
                    Err(_) => false,
                };
                if !live {
                    stale.push(member);
                }
            }

            purged += stale.len() as u64;
            self.cache.remove_from_set(&index, &stale).await?;
        }

        Ok(purged)
    }

    async fn active_count(&self) -> AppResult<u64> {
        let keys = self
            .cache
            .scan_keys(&format!("{}*", CACHE_PREFIX_SESSION))
            .await?;
        Ok(keys.len() as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        self.cache.ping().await
    }
}
