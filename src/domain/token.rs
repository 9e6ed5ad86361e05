//! Token claims and verification failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::UserRole;

/// Which kind of token a set of claims belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT claims shared by access and refresh tokens.
///
/// `role` is a snapshot taken at issuance time. `jti` is unique per token
/// and is the key refresh sessions are stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub role: UserRole,
    pub typ: TokenType,
    pub jti: Uuid,
    pub iss: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token is malformed")]
    Malformed,

    #[error("Wrong token type")]
    WrongType,

    #[error("Token is not yet valid")]
    NotYetValid,
}
