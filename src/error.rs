//! Error handler for autha-login.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A required input or collaborator was absent.
    #[error("missing param: {0}")]
    MissingParam(&'static str),

    /// An input was present but failed a structural check.
    #[error("invalid param: {0}")]
    InvalidParam(&'static str),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JWT operation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Wrap any error into [`ServerError::Internal`].
    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert foreign errors into [`ServerError::Internal`].
pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(|err| ServerError::Internal {
            details: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: Option<String>,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = Some(description.into());
        self
    }

    /// Attach a single field error.
    pub fn field(mut self, field: &str, message: &str) -> Self {
        self.errors
            .get_or_insert_with(Vec::new)
            .push(FieldError {
                field: field.to_owned(),
                message: message.to_owned(),
            });
        self
    }

    /// HTTP status carried by the body.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Default for ResponseError {
    /// Generic 500 body. Never carries details.
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: None,
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

impl From<&ServerError> for ResponseError {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::MissingParam(name) => ResponseError::default()
                .title("There were validation errors with your request.")
                .details(&err.to_string())
                .field(name, &format!("Missing '{name}' field."))
                .status(StatusCode::BAD_REQUEST),

            ServerError::InvalidParam(name) => ResponseError::default()
                .title("There were validation errors with your request.")
                .details(&err.to_string())
                .field(name, &format!("Invalid '{name}' field."))
                .status(StatusCode::BAD_REQUEST),

            ServerError::Unauthorized => ResponseError::default()
                .title("Invalid email or password.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");
                ResponseError::default()
            },

            _ => {
                tracing::error!(error = %err, "server returned 500 status");
                ResponseError::default()
            },
        }
    }
}
