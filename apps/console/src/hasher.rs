//! Credential hashing.
//!
//! Passwords are stored as Argon2id PHC strings. The plaintext is never
//! stored or logged.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::AuthSettings;
use crate::error::{ClinicError, ClinicResult};

/// One-way password hashing used by login and registration.
pub trait CredentialHasher: Send + Sync {
    /// Produces a salted digest of `password`.
    fn hash(&self, password: &str) -> ClinicResult<String>;

    /// True when `password` matches the stored digest.
    ///
    /// A malformed digest never matches.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Argon2id hasher with configurable cost.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> ClinicResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ClinicError::Hashing(format!("invalid argon2 parameters: {}", e)))?;
        Ok(Argon2Hasher { params })
    }

    pub fn from_settings(settings: &AuthSettings) -> ClinicResult<Self> {
        Self::new(
            settings.argon2_memory_kib,
            settings.argon2_iterations,
            settings.argon2_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> ClinicResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ClinicError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(h) => h,
            Err(_) => return false,
        };

        // Cost parameters come from the stored digest
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap();
        let digest = hasher.hash("s3cret!").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(!digest.contains("s3cret!"));
        assert!(hasher.verify("s3cret!", &digest));
        assert!(!hasher.verify("S3cret!", &digest));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_digest_never_matches() {
        assert!(!cheap().verify("anything", "plaintext-not-a-phc-string"));
        assert!(!cheap().verify("", ""));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            Argon2Hasher::new(1, 0, 0),
            Err(ClinicError::Hashing(_))
        ));
    }
}
