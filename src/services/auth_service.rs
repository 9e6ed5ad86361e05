//! Authentication service - register, login, refresh and logout.
//!
//! Every store and registry call runs under the configured [`StorePolicy`];
//! password work runs on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use super::{IssuedToken, TokenIssuer};
use crate::config::{AdminBootstrap, TOKEN_TYPE_BEARER};
use crate::domain::{Claims, NewUser, Password, PasswordHasher, RefreshSession, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{SessionRegistry, StorePolicy, UserRepository};
use crate::utils::Clock;

/// Token response returned after successful login
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// Short-lived JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Long-lived JWT refresh token
    pub refresh_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    #[schema(example = 604800)]
    pub refresh_expires_in: i64,
}

/// Token response returned by refresh
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 900)]
    pub expires_in: i64,
    /// Replacement refresh token; present only when rotation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
}

/// Authentication service trait for dependency injection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user with the `user` role
    async fn register(&self, username: String, password: String) -> AppResult<User>;

    /// Check credentials and issue an access/refresh token pair
    async fn login(&self, username: String, password: String) -> AppResult<TokenResponse>;

    /// Exchange a live refresh token for a new access token
    async fn refresh(&self, refresh_token: String) -> AppResult<RefreshResponse>;

    /// Revoke the session behind a refresh token. Idempotent.
    async fn logout(&self, refresh_token: String) -> AppResult<()>;

    /// Revoke every session of a user, returning how many were active
    async fn logout_all(&self, user_id: Uuid) -> AppResult<u64>;

    /// Verify an access token and extract claims
    fn verify_access(&self, token: &str) -> AppResult<Claims>;

    /// Load the user an access token was issued to
    async fn current_user(&self, user_id: Uuid) -> AppResult<User>;

    /// Create the configured admin if no user holds that name. Returns
    /// whether an account was created.
    async fn ensure_admin(&self, admin: AdminBootstrap) -> AppResult<bool>;
}

/// Concrete implementation of AuthService.
pub struct Authenticator {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRegistry>,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    policy: StorePolicy,
    clock: Arc<dyn Clock>,
    rotate_refresh_tokens: bool,
    password_min_length: usize,
}

impl Authenticator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRegistry>,
        tokens: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        policy: StorePolicy,
        clock: Arc<dyn Clock>,
        rotate_refresh_tokens: bool,
        password_min_length: usize,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            hasher,
            policy,
            clock,
            rotate_refresh_tokens,
            password_min_length,
        }
    }

    async fn hash_password(&self, password: String) -> AppResult<Password> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("Hashing task failed: {}", e)))?
    }

    /// Verify against the stored hash, or against the dummy hash when the
    /// user is unknown so both paths cost the same.
    async fn verify_password(&self, password: String, stored: Option<Password>) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_dummy(&password),
        })
        .await
        .map_err(|e| AppError::internal(format!("Verification task failed: {}", e)))
    }

    async fn create_user(&self, username: String, password: String, role: UserRole) -> AppResult<User> {
        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            username,
            password_hash,
            role,
        };

        self.policy
            .run("users.create", || self.users.create(new_user.clone()))
            .await
    }

    /// Sessions outlive the token by the skew so the registry never drops a
    /// token the verifier would still accept.
    async fn record_session(&self, user: &User, refresh: &IssuedToken) -> AppResult<()> {
        let session = RefreshSession {
            token_id: refresh.token_id,
            user_id: user.id,
            issued_at: refresh.issued_at,
            expires_at: refresh.expires_at + self.tokens.config().clock_skew,
        };

        self.policy
            .run("sessions.record", || self.sessions.record(&session))
            .await
    }

    /// Drop a replacement session that lost its rotation. Failures are only
    /// logged; the orphan expires with its token.
    async fn discard_session(&self, token_id: Uuid) {
        if let Err(e) = self
            .policy
            .run("sessions.revoke", || self.sessions.revoke(token_id))
            .await
        {
            tracing::warn!(token_id = %token_id, error = %e, "Failed to discard replacement session");
        }
    }

    /// Re-read the user so role changes and deletions take effect
    async fn refreshing_user(&self, claims: &Claims) -> AppResult<User> {
        self.find_user(claims.sub).await?.ok_or(AppError::Unauthorized)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.policy
            .run("users.find_by_id", || self.users.find_by_id(id))
            .await
    }

    fn access_lifetime(&self) -> i64 {
        self.tokens.config().access_ttl.num_seconds()
    }

    fn refresh_lifetime(&self) -> i64 {
        self.tokens.config().refresh_ttl.num_seconds()
    }
}

#[async_trait]
impl AuthService for Authenticator {
    async fn register(&self, username: String, password: String) -> AppResult<User> {
        // Shape (charset, length caps) is validated by the handler's ValidatedJson extractor
        if password.chars().count() < self.password_min_length {
            return Err(AppError::validation(format!(
                "password: must be at least {} characters",
                self.password_min_length
            )));
        }

        let user = self.create_user(username, password, UserRole::User).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    async fn login(&self, username: String, password: String) -> AppResult<TokenResponse> {
        let user = self
            .policy
            .run("users.find_by_username", || self.users.find_by_username(&username))
            .await?;

        let stored = user.as_ref().map(|user| user.password_hash.clone());
        let password_valid = self.verify_password(password, stored).await?;

        let user = match user {
            Some(user) if password_valid => user,
            _ => {
                tracing::warn!("Login rejected: invalid credentials");
                return Err(AppError::InvalidCredentials);
            }
        };

        // Stamp the login first so a failure here never strands a session
        let now = self.clock.now();
        self.policy
            .run("users.record_login", || self.users.record_login(user.id, now))
            .await?;

        let access = self.tokens.issue_access(&user)?;
        let refresh = self.tokens.issue_refresh(&user)?;
        self.record_session(&user, &refresh).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_lifetime(),
            refresh_expires_in: self.refresh_lifetime(),
        })
    }

    async fn refresh(&self, refresh_token: String) -> AppResult<RefreshResponse> {
        let claims = self.tokens.verify_refresh(&refresh_token)?;

        if !self.rotate_refresh_tokens {
            let live = self
                .policy
                .run("sessions.is_active", || self.sessions.is_active(claims.jti))
                .await?;
            if !live {
                tracing::warn!(user_id = %claims.sub, token_id = %claims.jti, "Refresh rejected: session revoked");
                return Err(AppError::TokenRevoked);
            }

            let user = self.refreshing_user(&claims).await?;
            let access = self.tokens.issue_access(&user)?;
            tracing::debug!(user_id = %user.id, "Access token refreshed");

            return Ok(RefreshResponse {
                access_token: access.token,
                token_type: TOKEN_TYPE_BEARER.to_string(),
                expires_in: self.access_lifetime(),
                refresh_token: None,
                refresh_expires_in: None,
            });
        }

        let user = self.refreshing_user(&claims).await?;
        let access = self.tokens.issue_access(&user)?;

        // The replacement is recorded before the old id is taken, so a failed
        // write leaves the presented token usable for a retry. Only the caller
        // that takes the old id keeps its replacement.
        let rotated = self.tokens.issue_refresh(&user)?;
        self.record_session(&user, &rotated).await?;

        let taken = match self
            .policy
            .run("sessions.revoke", || self.sessions.revoke(claims.jti))
            .await
        {
            Ok(taken) => taken,
            Err(e) => {
                self.discard_session(rotated.token_id).await;
                return Err(e);
            }
        };

        if !taken {
            self.discard_session(rotated.token_id).await;
            tracing::warn!(user_id = %claims.sub, token_id = %claims.jti, "Refresh rejected: session revoked");
            return Err(AppError::TokenRevoked);
        }

        tracing::debug!(user_id = %user.id, "Access token refreshed, refresh token rotated");

        Ok(RefreshResponse {
            access_token: access.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_lifetime(),
            refresh_token: Some(rotated.token),
            refresh_expires_in: Some(self.refresh_lifetime()),
        })
    }

    async fn logout(&self, refresh_token: String) -> AppResult<()> {
        // Expired tokens may still log out; forged ones may not
        let claims = self.tokens.decode_refresh_ignoring_expiry(&refresh_token)?;

        let revoked = self
            .policy
            .run("sessions.revoke", || self.sessions.revoke(claims.jti))
            .await?;

        tracing::info!(user_id = %claims.sub, revoked, "User logged out");
        Ok(())
    }

    async fn logout_all(&self, user_id: Uuid) -> AppResult<u64> {
        let revoked = self
            .policy
            .run("sessions.revoke_all_for_user", || {
                self.sessions.revoke_all_for_user(user_id)
            })
            .await?;

        tracing::info!(user_id = %user_id, revoked, "User logged out everywhere");
        Ok(revoked)
    }

    fn verify_access(&self, token: &str) -> AppResult<Claims> {
        Ok(self.tokens.verify_access(token)?)
    }

    async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.find_user(user_id).await?.ok_or(AppError::Unauthorized)
    }

    async fn ensure_admin(&self, admin: AdminBootstrap) -> AppResult<bool> {
        let existing = self
            .policy
            .run("users.find_by_username", || {
                self.users.find_by_username(&admin.username)
            })
            .await?;

        if let Some(user) = existing {
            if !user.is_admin() {
                tracing::warn!(user_id = %user.id, "Bootstrap admin name is held by a non-admin user");
            }
            return Ok(false);
        }

        let user = self
            .create_user(admin.username, admin.password, UserRole::Admin)
            .await?;
        tracing::info!(user_id = %user.id, "Bootstrap admin created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::domain::TokenError;
    use crate::infra::{
        InMemorySessionRegistry, MockSessionRegistry, MockUserRepository, UserStore,
    };
    use crate::utils::ManualClock;
    use argon2::Params;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    const SECRET: &str = "test-secret-key-for-testing-only-32chars";

    struct Harness {
        auth: Authenticator,
        clock: ManualClock,
        sessions: Arc<dyn SessionRegistry>,
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(Params::new(1024, 1, 1, None).unwrap()).unwrap()
    }

    fn policy() -> StorePolicy {
        StorePolicy {
            timeout: StdDuration::from_millis(200),
            retries: 1,
            backoff: StdDuration::from_millis(1),
        }
    }

    fn build(sessions: Option<Arc<dyn SessionRegistry>>, rotate: bool, min_length: usize) -> Harness {
        build_with(None, sessions, rotate, min_length)
    }

    fn build_with(
        users: Option<Arc<dyn UserRepository>>,
        sessions: Option<Arc<dyn SessionRegistry>>,
        rotate: bool,
        min_length: usize,
    ) -> Harness {
        let clock = ManualClock::default();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let sessions =
            sessions.unwrap_or_else(|| Arc::new(InMemorySessionRegistry::new(shared.clone())));
        let tokens = Arc::new(TokenIssuer::new(
            TokenConfig::new(SECRET)
                .unwrap()
                .with_clock_skew(Duration::zero()),
            shared.clone(),
        ));

        let users = users.unwrap_or_else(|| Arc::new(UserStore::new(shared.clone())));

        let auth = Authenticator::new(
            users,
            sessions.clone(),
            tokens,
            hasher(),
            policy(),
            shared,
            rotate,
            min_length,
        );

        Harness {
            auth,
            clock,
            sessions,
        }
    }

    fn harness() -> Harness {
        build(None, true, 1)
    }

    async fn login(h: &Harness) -> TokenResponse {
        h.auth
            .register("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();
        h.auth
            .login("alice".to_string(), "pw123".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();
        let user = h
            .auth
            .register("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::User);

        let tokens = h
            .auth
            .login("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 15 * 60);
        assert_eq!(tokens.refresh_expires_in, 7 * 24 * 3600);

        let claims = h.auth.verify_access(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, user.id);

        let stored = h.auth.current_user(user.id).await.unwrap();
        assert!(stored.last_login_at.is_some());
        assert_eq!(h.sessions.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let h = harness();
        h.auth
            .register("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();

        let result = h
            .auth
            .register("alice".to_string(), "other".to_string())
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_password_min_length_enforced() {
        let h = build(None, true, 8);
        let result = h
            .auth
            .register("alice".to_string(), "short".to_string())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_alike() {
        let h = harness();
        login(&h).await;

        let wrong_password = h
            .auth
            .login("alice".to_string(), "nope".to_string())
            .await
            .unwrap_err();
        let unknown_user = h
            .auth
            .login("mallory".to_string(), "pw123".to_string())
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.user_message(), unknown_user.user_message());
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let h = harness();
        let tokens = login(&h).await;

        let refreshed = h.auth.refresh(tokens.refresh_token.clone()).await.unwrap();
        let rotated = refreshed.refresh_token.expect("rotation returns a new token");
        assert!(h.auth.verify_access(&refreshed.access_token).is_ok());

        // The rotated-away token is dead, the new one works
        let reuse = h.auth.refresh(tokens.refresh_token).await;
        assert!(matches!(reuse, Err(AppError::TokenRevoked)));
        assert!(h.auth.refresh(rotated).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = Arc::new(harness());
        let tokens = login(&h).await;

        let attempts: Vec<_> = (0..6)
            .map(|_| {
                let h = h.clone();
                let token = tokens.refresh_token.clone();
                tokio::spawn(async move { h.auth.refresh(token).await })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, AppError::TokenRevoked)),
            }
        }
        assert_eq!(winners, 1);

        // Losers drop their replacement sessions
        assert_eq!(h.sessions.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_keeps_token() {
        let h = build(None, false, 1);
        let tokens = login(&h).await;

        let first = h.auth.refresh(tokens.refresh_token.clone()).await.unwrap();
        assert!(first.refresh_token.is_none());
        assert!(h.auth.refresh(tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_after_logout_revoked() {
        let h = harness();
        let tokens = login(&h).await;

        h.auth.logout(tokens.refresh_token.clone()).await.unwrap();
        // Logout is idempotent
        h.auth.logout(tokens.refresh_token.clone()).await.unwrap();

        let result = h.auth.refresh(tokens.refresh_token).await;
        assert!(matches!(result, Err(AppError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_expired_refresh_token() {
        let h = harness();
        let tokens = login(&h).await;

        h.clock.advance(Duration::days(7) + Duration::seconds(1));

        let result = h.auth.refresh(tokens.refresh_token.clone()).await;
        assert!(matches!(result, Err(AppError::Token(TokenError::Expired))));

        // An expired but authentic token can still log out
        assert!(h.auth.logout(tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_rejects_access_token() {
        let h = harness();
        let tokens = login(&h).await;

        let result = h.auth.logout(tokens.access_token).await;
        assert!(matches!(result, Err(AppError::Token(TokenError::WrongType))));
    }

    #[tokio::test]
    async fn test_logout_all() {
        let h = harness();
        let first = login(&h).await;
        let second = h
            .auth
            .login("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();
        let claims = h.auth.verify_access(&first.access_token).unwrap();

        assert_eq!(h.auth.logout_all(claims.sub).await.unwrap(), 2);

        for token in [first.refresh_token, second.refresh_token] {
            assert!(matches!(
                h.auth.refresh(token).await,
                Err(AppError::TokenRevoked)
            ));
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let h = harness();
        let admin = AdminBootstrap {
            username: "root".to_string(),
            password: "hunter22".to_string(),
        };

        assert!(h.auth.ensure_admin(admin.clone()).await.unwrap());
        assert!(!h.auth.ensure_admin(admin).await.unwrap());

        let tokens = h
            .auth
            .login("root".to_string(), "hunter22".to_string())
            .await
            .unwrap();
        let claims = h.auth.verify_access(&tokens.access_token).unwrap();
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_transient_registry_failure_retried_once() {
        let mut sessions = MockSessionRegistry::new();
        let mut failures = 0;
        sessions.expect_record().times(2).returning(move |_| {
            failures += 1;
            if failures == 1 {
                Err(AppError::service_unavailable("sessions.record"))
            } else {
                Ok(())
            }
        });

        let h = build(Some(Arc::new(sessions)), true, 1);
        let tokens = login(&h).await;
        assert!(!tokens.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_persistent_registry_failure_is_unavailable() {
        let mut sessions = MockSessionRegistry::new();
        sessions
            .expect_record()
            .times(2)
            .returning(|_| Err(AppError::service_unavailable("sessions.record")));

        let h = build(Some(Arc::new(sessions)), true, 1);
        h.auth
            .register("alice".to_string(), "pw123".to_string())
            .await
            .unwrap();

        let result = h
            .auth
            .login("alice".to_string(), "pw123".to_string())
            .await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_rotation_keeps_presented_token() {
        let mut sessions = MockSessionRegistry::new();
        let mut records = 0;
        // Login succeeds, both attempts of the first rotation fail, the retry succeeds
        sessions.expect_record().times(4).returning(move |_| {
            records += 1;
            if records == 2 || records == 3 {
                Err(AppError::service_unavailable("sessions.record"))
            } else {
                Ok(())
            }
        });
        // The old id is only taken once the replacement is stored
        sessions.expect_revoke().times(1).returning(|_| Ok(true));

        let h = build(Some(Arc::new(sessions)), true, 1);
        let tokens = login(&h).await;

        let failed = h.auth.refresh(tokens.refresh_token.clone()).await;
        assert!(matches!(failed, Err(AppError::ServiceUnavailable(_))));

        let retried = h.auth.refresh(tokens.refresh_token).await.unwrap();
        assert!(retried.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_lost_rotation_discards_replacement() {
        let mut sessions = MockSessionRegistry::new();
        sessions.expect_record().times(2).returning(|_| Ok(()));
        let mut revokes = 0;
        // First revoke is the take on the already-revoked id, second drops the replacement
        sessions.expect_revoke().times(2).returning(move |_| {
            revokes += 1;
            Ok(revokes == 2)
        });

        let h = build(Some(Arc::new(sessions)), true, 1);
        let tokens = login(&h).await;

        let result = h.auth.refresh(tokens.refresh_token).await;
        assert!(matches!(result, Err(AppError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_failed_login_stamp_leaves_no_session() {
        let password_hash = hasher().hash("pw123").unwrap();
        let user = User::new(
            Uuid::new_v4(),
            NewUser {
                username: "alice".to_string(),
                password_hash,
                role: UserRole::User,
            },
            chrono::Utc::now(),
        );

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_record_login()
            .times(2)
            .returning(|_, _| Err(AppError::service_unavailable("users.record_login")));

        let h = build_with(Some(Arc::new(users)), None, true, 1);
        let result = h
            .auth
            .login("alice".to_string(), "pw123".to_string())
            .await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(h.sessions.active_count().await.unwrap(), 0);
    }
}
