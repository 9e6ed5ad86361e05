//! Application settings loaded from environment variables.
//!
//! The configuration is assembled once at startup and handed to the
//! components that need it; nothing mutates it afterwards.

use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use super::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_MINUTES, DEFAULT_ARGON2_ITERATIONS, DEFAULT_ARGON2_MEMORY_KIB,
    DEFAULT_ARGON2_PARALLELISM, DEFAULT_CLOCK_SKEW_SECONDS, DEFAULT_CORS_ORIGINS,
    DEFAULT_JWT_ISSUER, DEFAULT_PASSWORD_MIN_LENGTH, DEFAULT_REDIS_URL,
    DEFAULT_REFRESH_TOKEN_TTL_DAYS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    DEFAULT_SESSION_SWEEP_INTERVAL_SECONDS, DEFAULT_STORE_RETRY_BACKOFF_MS,
    DEFAULT_STORE_TIMEOUT_MS, DEV_JWT_SECRET, MAX_ACCESS_TOKEN_TTL_MINUTES,
    MAX_CLOCK_SKEW_SECONDS, MAX_PASSWORD_LENGTH, MAX_REFRESH_TOKEN_TTL_DAYS,
    MIN_JWT_SECRET_LENGTH, STORE_RETRIES,
};
use crate::infra::StorePolicy;

/// Configuration errors reported at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("JWT_SECRET must be at least {0} characters long")]
    SecretTooShort(usize),
}

/// Which backend holds refresh sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

impl FromStr for SessionBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "redis" => Ok(SessionBackend::Redis),
            _ => Err(()),
        }
    }
}

/// Which backend holds user accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserBackend {
    Memory,
    Database,
}

impl FromStr for UserBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(UserBackend::Memory),
            "database" | "postgres" => Ok(UserBackend::Database),
            _ => Err(()),
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Token signing and lifetime settings, owned by the token issuer.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub clock_skew: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenConfig {
    /// Create a token configuration with default lifetimes.
    ///
    /// # Errors
    /// Returns [`ConfigError::SecretTooShort`] for secrets under
    /// [`MIN_JWT_SECRET_LENGTH`] characters.
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort(MIN_JWT_SECRET_LENGTH));
        }

        Ok(Self {
            secret,
            issuer: DEFAULT_JWT_ISSUER.to_string(),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            clock_skew: Duration::seconds(DEFAULT_CLOCK_SKEW_SECONDS),
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

/// Password policy and Argon2 cost parameters.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub params: argon2::Params,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            params: argon2::Params::default(),
        }
    }
}

/// Credentials for an administrator created at startup when missing.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub token: TokenConfig,
    pub refresh_rotation: bool,
    pub user_backend: UserBackend,
    /// Required when `user_backend` is `Database`
    pub database_url: Option<String>,
    pub session_backend: SessionBackend,
    pub redis_url: String,
    pub store_policy: StorePolicy,
    /// `None` disables the background sweep
    pub sweep_interval: Option<StdDuration>,
    pub password: PasswordConfig,
    pub bootstrap_admin: Option<AdminBootstrap>,
    pub cors_origins: CorsOrigins,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("token", &self.token)
            .field("refresh_rotation", &self.refresh_rotation)
            .field("user_backend", &self.user_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("session_backend", &self.session_backend)
            .field("redis_url", &"[REDACTED]")
            .field("store_policy", &self.store_policy)
            .field("sweep_interval", &self.sweep_interval)
            .field("password", &self.password)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key/value source.
    ///
    /// Unset keys fall back to defaults; set-but-unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let access_minutes: i64 =
            parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", DEFAULT_ACCESS_TOKEN_TTL_MINUTES)?;
        let refresh_days: i64 =
            parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TOKEN_TTL_DAYS)?;
        let skew_seconds: i64 =
            parse_or(&lookup, "CLOCK_SKEW_SECONDS", DEFAULT_CLOCK_SKEW_SECONDS)?;

        let access_ttl = bounded(
            "ACCESS_TOKEN_TTL_MINUTES",
            access_minutes,
            1..=MAX_ACCESS_TOKEN_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        let refresh_ttl = bounded(
            "REFRESH_TOKEN_TTL_DAYS",
            refresh_days,
            1..=MAX_REFRESH_TOKEN_TTL_DAYS,
            Duration::try_days,
        )?;
        let clock_skew = bounded(
            "CLOCK_SKEW_SECONDS",
            skew_seconds,
            0..=MAX_CLOCK_SKEW_SECONDS,
            Duration::try_seconds,
        )?;

        let token = TokenConfig::new(secret)?
            .with_issuer(lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()))
            .with_access_ttl(access_ttl)
            .with_refresh_ttl(refresh_ttl)
            .with_clock_skew(clock_skew);

        // Accounts go to the database whenever one is configured
        let database_url = lookup("DATABASE_URL");
        let user_backend = match lookup("USER_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "USER_BACKEND",
                value,
            })?,
            None if database_url.is_some() => UserBackend::Database,
            None => UserBackend::Memory,
        };
        if user_backend == UserBackend::Database && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let session_backend = match lookup("SESSION_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    key: "SESSION_BACKEND",
                    value,
                })?,
            None => SessionBackend::Memory,
        };

        let store_policy = StorePolicy {
            timeout: StdDuration::from_millis(parse_or(
                &lookup,
                "STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT_MS,
            )?),
            retries: STORE_RETRIES,
            backoff: StdDuration::from_millis(parse_or(
                &lookup,
                "STORE_RETRY_BACKOFF_MS",
                DEFAULT_STORE_RETRY_BACKOFF_MS,
            )?),
        };

        let sweep_seconds: u64 = parse_or(
            &lookup,
            "SESSION_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SESSION_SWEEP_INTERVAL_SECONDS,
        )?;

        let min_length: usize =
            parse_or(&lookup, "PASSWORD_MIN_LENGTH", DEFAULT_PASSWORD_MIN_LENGTH)?;
        if min_length > MAX_PASSWORD_LENGTH as usize {
            return Err(invalid("PASSWORD_MIN_LENGTH", min_length));
        }

        let memory_kib: u32 = parse_or(&lookup, "ARGON2_MEMORY_KIB", DEFAULT_ARGON2_MEMORY_KIB)?;
        let iterations: u32 = parse_or(&lookup, "ARGON2_ITERATIONS", DEFAULT_ARGON2_ITERATIONS)?;
        let parallelism: u32 =
            parse_or(&lookup, "ARGON2_PARALLELISM", DEFAULT_ARGON2_PARALLELISM)?;
        let params = argon2::Params::new(memory_kib, iterations, parallelism, None).map_err(
            |e| ConfigError::Invalid {
                key: "ARGON2_*",
                value: e.to_string(),
            },
        )?;

        let bootstrap_admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminBootstrap { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_USERNAME")),
        };

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            token,
            refresh_rotation: parse_flag(&lookup, "REFRESH_TOKEN_ROTATION", true)?,
            user_backend,
            database_url,
            session_backend,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            store_policy,
            sweep_interval: (sweep_seconds > 0).then(|| StdDuration::from_secs(sweep_seconds)),
            password: PasswordConfig { min_length, params },
            bootstrap_admin,
            cors_origins: parse_cors(
                &lookup("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
            ),
        })
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

fn parse_cors(raw: &str) -> CorsOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}

/// Range-check a lifetime setting and convert it to a duration
fn bounded(
    key: &'static str,
    value: i64,
    range: std::ops::RangeInclusive<i64>,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    if !range.contains(&value) {
        return Err(invalid(key, value));
    }
    to_duration(value).ok_or_else(|| invalid(key, value))
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}
