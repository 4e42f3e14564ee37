//! Authentication use case port.

use async_trait::async_trait;

use crate::error::Result;
use crate::token::AccessToken;

/// Inbound port for user authentication.
#[async_trait]
pub trait Authenticate: Send + Sync {
    /// Authenticate a user with credentials.
    ///
    /// Returns `Ok(None)` when the credentials do not match any account. An
    /// unknown email and a wrong password are not told apart.
    async fn auth(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AccessToken>>;
}
