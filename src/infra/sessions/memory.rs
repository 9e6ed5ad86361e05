use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::SessionRegistry;
use crate::domain::RefreshSession;
use crate::errors::AppResult;
use crate::utils::Clock;

/// Process-local registry. Sessions do not survive a restart.
pub struct InMemorySessionRegistry {
    sessions: Mutex<HashMap<Uuid, RefreshSession>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, RefreshSession>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    async fn record(&self, session: &RefreshSession) -> AppResult<()> {
        self.sessions().insert(session.token_id, session.clone());
        tracing::debug!(token_id = %session.token_id, user_id = %session.user_id, "Session recorded");
        Ok(())
    }

    async fn is_active(&self, token_id: Uuid) -> AppResult<bool> {
        let now = self.clock.now();
        Ok(self
            .sessions()
            .get(&token_id)
            .is_some_and(|session| !session.is_expired(now)))
    }

    async fn revoke(&self, token_id: Uuid) -> AppResult<bool> {
        let now = self.clock.now();
        let removed = self.sessions().remove(&token_id);
        let was_active = removed.is_some_and(|session| !session.is_expired(now));

        if was_active {
            tracing::debug!(token_id = %token_id, "Session revoked");
        }
        Ok(was_active)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let now = self.clock.now();
        let mut revoked = 0;

        self.sessions().retain(|_, session| {
            if session.user_id != user_id {
                return true;
            }
            if !session.is_expired(now) {
                revoked += 1;
            }
            false
        });

        Ok(revoked)
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn active_count(&self) -> AppResult<u64> {
        let now = self.clock.now();
        Ok(self
            .sessions()
            .values()
            .filter(|session| !session.is_expired(now))
            .count() as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
