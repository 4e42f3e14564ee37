//! Manage access tokens.

use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::ports::outbound::TokenGenerator;

const DEFAULT_AUDIENCE: &str = "account.gravitalia.com";
pub const EXPIRATION_TIME: u64 = 60 * 15; // 15 minutes.
const JTI_LENGTH: usize = 16;

/// Opaque access token handed back to the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new [`AccessToken`] from its raw value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Tokens are credentials, keep them out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
    /// Unique token identifier.
    pub jti: String,
}

/// HS256 JSON Web Token generator.
#[derive(Clone)]
pub struct JwtTokenGenerator {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expiration: u64,
}

impl JwtTokenGenerator {
    /// Create a new [`JwtTokenGenerator`] signing with `secret`.
    pub fn new(issuer: &str, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ServerError::MissingParam("secret"));
        }

        Ok(Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            audience: DEFAULT_AUDIENCE.to_owned(),
            expiration: EXPIRATION_TIME,
        })
    }

    /// Set `audience` field on JWT.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Set token lifetime, in seconds.
    pub fn with_expiration(mut self, seconds: u64) -> Self {
        self.expiration = seconds;
        self
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[async_trait]
impl TokenGenerator for JwtTokenGenerator {
    async fn generate(&self, user_id: &str) -> Result<AccessToken> {
        if user_id.is_empty() {
            return Err(ServerError::MissingParam("user_id"));
        }

        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            aud: self.audience.clone(),
            exp: now + self.expiration,
            iat: now,
            iss: self.issuer.clone(),
            sub: user_id.to_owned(),
            jti: Alphanumeric.sample_string(&mut OsRng, JTI_LENGTH),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(AccessToken::new(token))
    }
}
