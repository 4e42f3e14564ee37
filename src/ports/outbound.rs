//! Capabilities consumed by the authentication use case.

use async_trait::async_trait;

use crate::error::Result;
use crate::token::AccessToken;
use crate::user::User;

/// Port for email syntax checks. Must not perform I/O.
pub trait EmailValidator: Send + Sync {
    fn is_valid(&self, email: &str) -> bool;
}

/// Port for password hash comparison.
#[async_trait]
pub trait Encrypter: Send + Sync {
    /// Check a plaintext secret against a stored hash.
    async fn compare(&self, plain: &str, hash: &str) -> Result<bool>;
}

/// Port for access token derivation.
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    /// Derive a new token for `user_id`. Two calls may yield distinct tokens.
    async fn generate(&self, user_id: &str) -> Result<AccessToken>;
}

/// Port for user lookup.
#[async_trait]
pub trait LoadUserByEmailRepository: Send + Sync {
    /// Find the credential projection of a user.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingParam`] if `email` is empty.
    ///
    /// [`ServerError::MissingParam`]: crate::error::ServerError::MissingParam
    async fn load(&self, email: &str) -> Result<Option<User>>;
}

/// Port for access token persistence.
#[async_trait]
pub trait UpdateAccessTokenRepository: Send + Sync {
    /// Save `token` as the current access token of `user_id`.
    async fn update(&self, user_id: &str, token: &AccessToken) -> Result<()>;
}
