//! Token issuance and verification.
//!
//! Tokens are HS256 JWTs. Expiry is not left to `jsonwebtoken`: it is
//! checked here against the injected [`Clock`] with the configured skew, so
//! the boundary behaves the same in tests and in production.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::domain::{Claims, TokenError, TokenType, User};
use crate::errors::AppResult;
use crate::utils::Clock;

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access and refresh tokens.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_bytes()),
            validation,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn issue_access(&self, user: &User) -> AppResult<IssuedToken> {
        self.issue(user, TokenType::Access, self.config.access_ttl)
    }

    pub fn issue_refresh(&self, user: &User) -> AppResult<IssuedToken> {
        self.issue(user, TokenType::Refresh, self.config.refresh_ttl)
    }

    fn issue(&self, user: &User, typ: TokenType, ttl: Duration) -> AppResult<IssuedToken> {
        // Claims carry whole seconds; keep the returned times in step with them
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = issued_at + ttl;
        let token_id = Uuid::new_v4();

        let claims = Claims {
            sub: user.id,
            role: user.role,
            typ,
            jti: token_id,
            iss: self.config.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        tracing::debug!(user_id = %user.id, token_id = %token_id, token_type = %typ, "Token issued");

        Ok(IssuedToken {
            token,
            token_id,
            issued_at,
            expires_at,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode_typed(token, TokenType::Access)?;
        self.check_lifetime(&claims)?;
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode_typed(token, TokenType::Refresh)?;
        self.check_lifetime(&claims)?;
        Ok(claims)
    }

    /// Check signature, issuer and type of a refresh token but not its
    /// lifetime, so an expired token can still name the session it belonged to.
    pub fn decode_refresh_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_typed(token, TokenType::Refresh)
    }

    fn decode_typed(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?
            .claims;

        if claims.typ != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn check_lifetime(&self, claims: &Claims) -> Result<(), TokenError> {
        let now = self.clock.now().timestamp();
        let skew = self.config.clock_skew.num_seconds();

        if now > claims.exp + skew {
            return Err(TokenError::Expired);
        }
        if claims.iat > now + skew {
            return Err(TokenError::NotYetValid);
        }
        Ok(())
    }
}
