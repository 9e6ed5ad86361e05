//! Application-wide constants
//!
//! Centralized location for magic values to improve maintainability.

// =============================================================================
// Pagination
// =============================================================================

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Maximum allowed items per page
pub const MAX_PAGE_SIZE: u64 = 100;

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

// =============================================================================
// Tokens
// =============================================================================

/// Default access token lifetime in minutes
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Default refresh token lifetime in days
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Upper bound accepted for ACCESS_TOKEN_TTL_MINUTES (one day)
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;

/// Upper bound accepted for REFRESH_TOKEN_TTL_DAYS
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Default tolerated clock skew when checking `exp` and `iat`
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 30;

/// Upper bound accepted for CLOCK_SKEW_SECONDS
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 300;

/// Default `iss` claim stamped into and required from every token
pub const DEFAULT_JWT_ISSUER: &str = "auth-gateway";

/// Minimum JWT secret length (security requirement)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Secret used by debug builds when JWT_SECRET is unset
pub const DEV_JWT_SECRET: &str = "dev-secret-key-minimum-32-chars!!";

/// Token type reported to clients
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

// =============================================================================
// User Roles
// =============================================================================

/// Default role assigned to new users
pub const ROLE_USER: &str = "user";

/// Administrator role with elevated privileges
pub const ROLE_ADMIN: &str = "admin";

// =============================================================================
// Server Configuration
// =============================================================================

/// Default server host address
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default CORS origin list (any origin)
pub const DEFAULT_CORS_ORIGINS: &str = "*";

// =============================================================================
// Session Registry
// =============================================================================

/// Default Redis URL (for development)
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Key prefix for refresh sessions
pub const CACHE_PREFIX_SESSION: &str = "session:";

/// Key prefix for the per-user index of refresh sessions
pub const CACHE_PREFIX_USER_SESSIONS: &str = "user_sessions:";

/// Default interval between expired-session sweeps (0 disables the sweeper)
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECONDS: u64 = 300;

// =============================================================================
// Store Resilience
// =============================================================================

/// Upper bound for a single store or registry call
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

/// Pause before the single retry of a transient failure
pub const DEFAULT_STORE_RETRY_BACKOFF_MS: u64 = 50;

/// Number of retries for transient store failures
pub const STORE_RETRIES: u32 = 1;

// =============================================================================
// Password Hashing
// =============================================================================

/// Argon2 memory cost in KiB (argon2 crate default)
pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19_456;

/// Argon2 iteration count (argon2 crate default)
pub const DEFAULT_ARGON2_ITERATIONS: u32 = 2;

/// Argon2 lane count (argon2 crate default)
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length accepted at registration
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 1;

/// Maximum password length, matching the request validation rules
pub const MAX_PASSWORD_LENGTH: u64 = 128;
