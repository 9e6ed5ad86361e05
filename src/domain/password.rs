//! Password hashing and verification.
//!
//! Hashes are Argon2id PHC strings with a random salt per call. Verification
//! reads the cost parameters back out of the stored string, so changing the
//! configured parameters never invalidates existing hashes.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::errors::{AppError, AppResult};

/// Password value object holding a hash, never the plain text.
#[derive(Clone)]
pub struct Password {
    hash: String,
}

// Don't expose hash in debug output (security)
impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Create a Password from an existing hash (from storage).
    pub fn from_hash(hash: String) -> Self {
        Self { hash }
    }

    /// Get the hash string for storage.
    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Consume and return the hash string.
    pub fn into_string(self) -> String {
        self.hash
    }
}

/// Argon2id hasher with configurable cost.
///
/// Cheap to clone; hashing and verification are CPU-bound and should run
/// on the blocking pool when called from async code.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy: Password,
}

impl PasswordHasher {
    /// Build a hasher and precompute the dummy hash used for unknown users.
    pub fn new(params: Params) -> AppResult<Self> {
        let dummy = hash_with(&params, "dummy-password-for-unknown-users")?;
        Ok(Self { params, dummy })
    }

    /// Hash a plain text password with a fresh random salt.
    pub fn hash(&self, plain_text: &str) -> AppResult<Password> {
        hash_with(&self.params, plain_text)
    }

    /// Verify a plain text password against a stored hash.
    ///
    /// The digest comparison inside `verify_password` is constant-time.
    /// Unparsable hashes never verify.
    pub fn verify(&self, plain_text: &str, stored: &Password) -> bool {
        match PasswordHash::new(stored.as_str()) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::error!("Stored password hash is not a valid PHC string: {}", e);
                false
            }
        }
    }

    /// Spend the same work as a real verification, then fail.
    ///
    /// Used when the username is unknown so login timing does not reveal
    /// which usernames exist.
    pub fn verify_dummy(&self, plain_text: &str) -> bool {
        let _ = self.verify(plain_text, &self.dummy);
        false
    }
}

fn hash_with(params: &Params, plain_text: &str) -> AppResult<Password> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
        .hash_password(plain_text.as_bytes(), &salt)
        .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?;
    Ok(Password::from_hash(hash.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(Params::new(1024, 1, 1, None).unwrap()).unwrap()
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hasher = hasher();
        let plain = "SecurePassword123!";
        let password = hasher.hash(plain).unwrap();

        assert!(hasher.verify(plain, &password));
        assert!(!hasher.verify("WrongPassword123", &password));
        assert!(!hasher.verify("", &password));
    }

    #[test]
    fn test_password_from_hash() {
        let hasher = hasher();
        let plain = "TestPassword123";
        let hash = hasher.hash(plain).unwrap().into_string();

        let restored = Password::from_hash(hash);
        assert!(hasher.verify(plain, &restored));
    }

    #[test]
    fn test_same_password_different_salts() {
        let hasher = hasher();
        let plain = "SamePassword123";
        let pass1 = hasher.hash(plain).unwrap();
        let pass2 = hasher.hash(plain).unwrap();

        // Different salts produce different hashes
        assert_ne!(pass1.as_str(), pass2.as_str());
        // But both verify correctly
        assert!(hasher.verify(plain, &pass1));
        assert!(hasher.verify(plain, &pass2));
    }

    #[test]
    fn test_hash_is_argon2id_phc() {
        let password = hasher().hash("pw123").unwrap();
        assert!(password.as_str().starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
    }

    #[test]
    fn test_verification_uses_stored_params() {
        let strong = PasswordHasher::new(Params::new(2048, 2, 1, None).unwrap()).unwrap();
        let password = strong.hash("pw123").unwrap();

        assert!(hasher().verify("pw123", &password));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        let garbage = Password::from_hash("not-a-phc-string".to_string());
        assert!(!hasher().verify("anything", &garbage));
    }

    #[test]
    fn test_dummy_verification_always_fails() {
        let hasher = hasher();
        assert!(!hasher.verify_dummy("dummy-password-for-unknown-users"));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let password = hasher().hash("pw123").unwrap();
        let rendered = format!("{:?}", password);
        assert!(!rendered.contains("argon2"));
    }
}
