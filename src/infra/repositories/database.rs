//! SeaORM-backed credential store.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use std::sync::Arc;
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use super::user_repository::{username_key, UserRepository};
use crate::config::ROLE_ADMIN;
use crate::domain::{NewUser, User};
use crate::errors::{AppError, AppResult};
use crate::infra::db;
use crate::types::PaginationParams;
use crate::utils::Clock;

/// User store persisted through SeaORM (Postgres in production).
pub struct DatabaseUserStore {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl DatabaseUserStore {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Timestamps are stored at microsecond precision, so keep them that way
    /// in memory too.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }
}

fn insert_error(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict("User"),
        _ => AppError::from(e),
    }
}

#[async_trait]
impl UserRepository for DatabaseUserStore {
    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let now = self.now();
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            username_key: Set(username_key(&new_user.username)),
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash.into_string()),
            role: Set(new_user.role.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
        };

        let model = active_model.insert(&self.db).await.map_err(insert_error)?;
        tracing::debug!(user_id = %model.id, "User stored");
        User::try_from(model)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        UserEntity::find()
            .filter(user::Column::UsernameKey.eq(username_key(username)))
            .one(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let Some(user) = UserEntity::find_by_id(id).one(&self.db).await? else {
            return Ok(());
        };

        let at = at.trunc_subsecs(6);
        let mut active: ActiveModel = user.into();
        active.last_login_at = Set(Some(at));
        active.updated_at = Set(at);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
        let total = UserEntity::find().count(&self.db).await?;
        let models = UserEntity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Username)
            // SQL offsets are signed 64-bit
            .offset(params.offset().min(i64::MAX as u64))
            .limit(params.limit())
            .all(&self.db)
            .await?;

        let users = models
            .into_iter()
            .map(User::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((users, total))
    }

    async fn count_by_role(&self) -> AppResult<(u64, u64)> {
        let total = UserEntity::find().count(&self.db).await?;
        let admins = UserEntity::find()
            .filter(user::Column::Role.eq(ROLE_ADMIN))
            .count(&self.db)
            .await?;
        Ok((total, admins))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(db::ping(&self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Password, UserRole};
    use crate::infra::db::testing;
    use crate::utils::ManualClock;
    use chrono::{Duration, TimeZone};

    async fn store() -> (DatabaseUserStore, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let db = testing::sqlite().await;
        (
            DatabaseUserStore::new(db.connection().clone(), Arc::new(clock.clone())),
            clock,
        )
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
        let (store, _) = store().await;
        let user = store.create(new_user("Alice", UserRole::Admin)).await.unwrap();

        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.username, "Alice");
        assert_eq!(by_name.role, UserRole::Admin);
        assert_eq!(by_name.password_hash.as_str(), "$argon2id$placeholder");

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.created_at, user.created_at);

        assert!(store.find_by_username("bob").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts_case_insensitively() {
        let (store, _) = store().await;
        store.create(new_user("alice", UserRole::User)).await.unwrap();

        let result = store.create(new_user("ALICE", UserRole::User)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_record_login() {
        let (store, clock) = store().await;
        let user = store.create(new_user("alice", UserRole::User)).await.unwrap();

        clock.advance(Duration::minutes(3));
        let at = clock.now();
        store.record_login(user.id, at).await.unwrap();

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.last_login_at, Some(at));
        assert_eq!(user.updated_at, at);

        store.record_login(Uuid::new_v4(), at).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_and_counts() {
        let (store, clock) = store().await;
        store.create(new_user("root", UserRole::Admin)).await.unwrap();
        for name in ["u1", "u2", "u3", "u4"] {
            clock.advance(Duration::seconds(1));
            store.create(new_user(name, UserRole::User)).await.unwrap();
        }

        let params = PaginationParams {
            page: 2,
            per_page: 2,
        };
        let (page, total) = store.list(&params).await.unwrap();
        assert_eq!(total, 5);
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["u2", "u3"]);

        assert_eq!(store.count_by_role().await.unwrap(), (5, 1));
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_accounts_survive_a_new_store() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let db = testing::sqlite().await;

        let first = DatabaseUserStore::new(db.connection().clone(), clock.clone());
        let user = first.create(new_user("alice", UserRole::User)).await.unwrap();
        drop(first);

        let second = DatabaseUserStore::new(db.connection().clone(), clock);
        let found = second.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }
}
