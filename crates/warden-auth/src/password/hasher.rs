//! Argon2id password hashing and verification.
//!
//! Both operations are CPU-bound and run on the blocking pool so a burst
//! of logins does not stall the async workers.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as ArgonHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::error::{AuthError, AuthResult};

/// Hashes and verifies passwords with Argon2id.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// Hasher with the library's default Argon2id parameters.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hasher with explicit cost parameters.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Cheapest parameters the library accepts. Tests only.
    pub fn insecure_fast() -> AuthResult<Self> {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .map_err(|e| AuthError::Internal(format!("Invalid Argon2 parameters: {e}")))?;
        Ok(Self::with_params(params))
    }

    /// Hash a plaintext password with a fresh random salt.
    pub async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::Internal(format!("Password hashing failed: {e}")))
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Hashing task failed: {e}")))?
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`; only an unreadable hash is an error.
    pub async fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {e}")))?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::Internal(format!(
                    "Password verification failed: {e}"
                ))),
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let hash = hasher.hash_password("Abc12345!").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("Abc12345!", &hash).await.unwrap());
        assert!(!hasher.verify_password("abc12345!", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let a = hasher.hash_password("same").await.unwrap();
        let b = hasher.hash_password("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_an_error() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        assert!(hasher.verify_password("x", "not-a-phc-string").await.is_err());
    }
}
