use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 64 * 1024; // KiB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const SECRET_BYTES: usize = 24;

/// Generates and verifies access token secrets.
pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .unwrap_or_default();

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Generates a new random secret.
    /// Returns (raw_secret, hash)
    pub fn generate(&self) -> Result<(String, String)> {
        let secret = generate_secret();
        let hash = self.hash(&secret)?;
        Ok((secret, hash))
    }

    /// Hashes a raw secret using Argon2id
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("failed to hash secret: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a raw secret against a stored hash
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("failed to verify secret: {e}"))),
        }
    }
}

/// Generates a cryptographically secure random hex string for the secret
#[must_use]
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_generation_format() {
        let generator = TokenGenerator::new();
        let (secret, _hash) = generator.generate().unwrap();

        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secret_verification_correct() {
        let generator = TokenGenerator::new();
        let (secret, hash) = generator.generate().unwrap();

        assert!(generator.verify(&secret, &hash).unwrap());
    }

    #[test]
    fn test_secret_verification_wrong_secret() {
        let generator = TokenGenerator::new();
        let (secret, hash) = generator.generate().unwrap();

        let wrong = format!("{}x", &secret[..secret.len() - 1]);
        assert!(!generator.verify(&wrong, &hash).unwrap());
    }

    #[test]
    fn test_hash_is_phc_format() {
        let generator = TokenGenerator::new();
        let (_, hash) = generator.generate().unwrap();

        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_malformed_hash() {
        let generator = TokenGenerator::new();
        assert!(generator.verify("secret", "not-a-hash").is_err());
    }
}
