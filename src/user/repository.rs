//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::ports::outbound::{
    LoadUserByEmailRepository, UpdateAccessTokenRepository,
};
use crate::token::AccessToken;
use crate::user::User;

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoadUserByEmailRepository for PgUserRepository {
    async fn load(&self, email: &str) -> Result<Option<User>> {
        if email.is_empty() {
            return Err(ServerError::MissingParam("email"));
        }

        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, password FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl UpdateAccessTokenRepository for PgUserRepository {
    async fn update(&self, user_id: &str, token: &AccessToken) -> Result<()> {
        if user_id.is_empty() {
            return Err(ServerError::MissingParam("user_id"));
        }
        if token.is_empty() {
            return Err(ServerError::MissingParam("access_token"));
        }

        sqlx::query(r#"UPDATE users SET access_token = $1 WHERE id = $2"#)
            .bind(token.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
