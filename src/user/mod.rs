mod repository;

pub use repository::*;

/// Credential projection of a user, as saved on database.
///
/// Both fields are non-empty when loaded.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}
