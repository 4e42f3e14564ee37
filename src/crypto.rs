//! Cryptogragic logics.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use async_trait::async_trait;
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;
use crate::error::{Result, ServerError, ToInternal};
use crate::ports::outbound::Encrypter;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Password encrypter that uses Argon2id and PHC string format for hashing
/// and verification.
#[derive(Clone)]
pub struct Argon2Encrypter {
    params: Params,
}

impl Argon2Encrypter {
    /// Create a new [`Argon2Encrypter`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))
        .catch()?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|err| CryptoError::Argon2(err.to_string()))
            .catch()?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC string.
    fn verify(&self, password: &[u8], phc_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(phc_hash)
            .map_err(|err| CryptoError::Argon2(err.to_string()))
            .catch()?;

        match self.argon2().verify_password(password, &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CryptoError::Argon2(err.to_string())).catch(),
        }
    }
}

#[async_trait]
impl Encrypter for Argon2Encrypter {
    async fn compare(&self, plain: &str, hash: &str) -> Result<bool> {
        let encrypter = self.clone();
        let plain = plain.to_owned();
        let hash = hash.to_owned();

        // Argon2 is CPU-bound, keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            encrypter.verify(plain.as_bytes(), &hash)
        })
        .await
        .map_err(|err| ServerError::internal("password verification panicked", err))?
    }
}
