//! User repository: the credential store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::domain::{NewUser, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;
use crate::utils::Clock;

/// User repository trait for dependency injection.
///
/// Usernames are unique without regard to case.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, failing with `Conflict("User")` if the username is taken
    async fn create(&self, new_user: NewUser) -> AppResult<User>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Stamp `last_login_at`; unknown ids are ignored
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Users ordered by creation time, with the total count
    async fn list(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)>;

    /// Returns `(total_users, admin_users)`
    async fn count_by_role(&self) -> AppResult<(u64, u64)>;

    /// Check connectivity to the backing store
    async fn ping(&self) -> AppResult<()>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Lowercased username -> id
    by_username: HashMap<String, Uuid>,
}

/// In-memory user store. Accounts live only as long as the process.
pub struct UserStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl UserStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }
}

/// Case-folded form every store uses for uniqueness and lookups
pub(super) fn username_key(username: &str) -> String {
    username.to_lowercase()
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let key = username_key(&new_user.username);
        let mut tables = self.tables.write().await;

        if tables.by_username.contains_key(&key) {
            return Err(AppError::conflict("User"));
        }

        let user = User::new(Uuid::new_v4(), new_user, self.clock.now());
        tables.by_username.insert(key, user.id);
        tables.users.insert(user.id, user.clone());

        tracing::debug!(user_id = %user.id, "User stored");
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_username
            .get(&username_key(username))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.record_login(at);
        }
        Ok(())
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
        let tables = self.tables.read().await;
        let mut users: Vec<&User> = tables.users.values().collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });

        let total = users.len() as u64;
        let page = users
            .into_iter()
            .skip(usize::try_from(params.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(params.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn count_by_role(&self) -> AppResult<(u64, u64)> {
        let tables = self.tables.read().await;
        let admins = tables
            .users
            .values()
            .filter(|user| user.role == UserRole::Admin)
            .count();
        Ok((tables.users.len() as u64, admins as u64))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Password;
    use crate::utils::ManualClock;
    use chrono::Duration;

    fn store() -> (UserStore, ManualClock) {
        let clock = ManualClock::default();
        (UserStore::new(Arc::new(clock.clone())), clock)
    }

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: Password::from_hash("$argon2id$placeholder".to_string()),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (store, _) = store();
        let user = store.create(new_user("alice", UserRole::User)).await.unwrap();

        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert!(by_id.last_login_at.is_none());

        assert!(store.find_by_username("bob").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts_case_insensitively() {
        let (store, _) = store();
        store.create(new_user("alice", UserRole::User)).await.unwrap();

        let result = store.create(new_user("ALICE", UserRole::User)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let found = store.find_by_username("Alice").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn test_concurrent_create_has_one_winner() {
        let (store, _) = store();
        let store = Arc::new(store);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_user("carol", UserRole::User)).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_record_login() {
        let (store, clock) = store();
        let user = store.create(new_user("alice", UserRole::User)).await.unwrap();

        clock.advance(Duration::minutes(3));
        let at = clock.now();
        store.record_login(user.id, at).await.unwrap();

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.last_login_at, Some(at));
        assert_eq!(user.updated_at, at);

        // Unknown ids are a no-op
        store.record_login(Uuid::new_v4(), at).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_paginates_in_creation_order() {
        let (store, clock) = store();
        for name in ["u1", "u2", "u3", "u4", "u5"] {
            store.create(new_user(name, UserRole::User)).await.unwrap();
            clock.advance(Duration::seconds(1));
        }

        let params = PaginationParams {
            page: 2,
            per_page: 2,
        };
        let (page, total) = store.list(&params).await.unwrap();

        assert_eq!(total, 5);
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["u3", "u4"]);
    }

    #[tokio::test]
    async fn test_oversized_pages_reach_every_user() {
        let (store, clock) = store();
        for i in 0..250 {
            store.create(new_user(&format!("user{i:03}"), UserRole::User)).await.unwrap();
            clock.advance(Duration::seconds(1));
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let params = PaginationParams {
                page,
                per_page: 1000,
            };
            let (users, total) = store.list(&params).await.unwrap();
            assert_eq!(total, 250);
            seen.extend(users.into_iter().map(|u| u.username));
        }

        assert_eq!(seen.len(), 250);
        assert_eq!(seen[100], "user100");
        assert_eq!(seen[249], "user249");

        let far = PaginationParams {
            page: u64::MAX,
            per_page: 2,
        };
        assert!(store.list(&far).await.unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn test_count_by_role() {
        let (store, _) = store();
        store.create(new_user("root", UserRole::Admin)).await.unwrap();
        store.create(new_user("alice", UserRole::User)).await.unwrap();
        store.create(new_user("bob", UserRole::User)).await.unwrap();

        assert_eq!(store.count_by_role().await.unwrap(), (3, 1));
    }
}
