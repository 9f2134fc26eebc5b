use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand_core::OsRng;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// One-way salted password hashing.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing opaque string.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check `plaintext` against a string previously returned by `hash`.
    /// Malformed hashes verify as `false`.
    fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// Argon2id hasher. Cost parameters only affect new hashes; verification
/// reads them back from the PHC string.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// `memory_kib` and `iterations` map to Argon2's m_cost and t_cost.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        if plaintext.is_empty() {
            return Err(HashError::EmptyPassword);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?
            .to_string();

        Ok(hash)
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is not a PHC string: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
