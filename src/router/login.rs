//! Login with email and password.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::AppState;
use crate::error::{ResponseError, ServerError};
use crate::ports::inbound::Authenticate;
use crate::ports::outbound::EmailValidator;
use crate::token::AccessToken;

/// Body of a login request. Both fields are optional so that their absence
/// is reported field by field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginBody {
    /// Read a login body out of a decoded JSON value.
    ///
    /// Anything but an object has no body. A field holding something other
    /// than a string is an invalid parameter.
    pub fn from_json(value: &Value) -> Result<Option<Self>, ServerError> {
        let Some(object) = value.as_object() else {
            return Ok(None);
        };
        let text = |field: &'static str| match object.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(ServerError::InvalidParam(field)),
        };

        let email = text("email")?;
        let password = match text("password") {
            Ok(password) => password,
            // The missing email is reported first.
            Err(_) if email.as_deref().is_none_or(str::is_empty) => None,
            Err(err) => return Err(err),
        };

        Ok(Some(Self { email, password }))
    }
}

/// HTTP-shaped login request.
#[derive(Debug, Default, Clone)]
pub struct HttpRequest {
    pub body: Option<LoginBody>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: AccessToken,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Token(TokenResponse),
    Error(ResponseError),
}

/// HTTP-shaped login response.
#[derive(Debug, PartialEq)]
pub struct HttpResponse {
    pub status_code: StatusCode,
    pub body: ResponseBody,
}

impl HttpResponse {
    fn ok(access_token: AccessToken) -> Self {
        Self {
            status_code: StatusCode::OK,
            body: ResponseBody::Token(TokenResponse { access_token }),
        }
    }

    fn error(err: &ServerError) -> Self {
        let body = ResponseError::from(err);
        Self {
            status_code: body.status_code(),
            body: ResponseBody::Error(body),
        }
    }

    fn server_error() -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            body: ResponseBody::Error(ResponseError::default()),
        }
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self.body)).into_response()
    }
}

/// Translate login requests into authentication attempts, and their
/// outcomes into HTTP responses.
pub struct LoginRouter {
    auth_use_case: Option<Arc<dyn Authenticate>>,
    email_validator: Option<Arc<dyn EmailValidator>>,
}

impl LoginRouter {
    /// Start building a [`LoginRouter`].
    pub fn builder() -> LoginRouterBuilder {
        LoginRouterBuilder::default()
    }

    /// Route a login request.
    ///
    /// Never fails: every error is rendered as a response, and internal
    /// errors never reach the body.
    pub async fn route(&self, request: Option<HttpRequest>) -> HttpResponse {
        let Some(body) = request.and_then(|request| request.body) else {
            tracing::debug!("login request without body");
            return HttpResponse::server_error();
        };

        let Some(email) = body.email.filter(|email| !email.is_empty()) else {
            return HttpResponse::error(&ServerError::MissingParam("email"));
        };
        let Some(password) = body.password.filter(|pwd| !pwd.is_empty()) else {
            return HttpResponse::error(&ServerError::MissingParam("password"));
        };

        let Some(email_validator) = &self.email_validator else {
            tracing::error!(
                collaborator = "email_validator",
                "login router is missing a collaborator"
            );
            return HttpResponse::server_error();
        };
        if !email_validator.is_valid(&email) {
            return HttpResponse::error(&ServerError::InvalidParam("email"));
        }

        let Some(auth_use_case) = &self.auth_use_case else {
            tracing::error!(
                collaborator = "auth_use_case",
                "login router is missing a collaborator"
            );
            return HttpResponse::server_error();
        };

        match auth_use_case.auth(&email, &password).await {
            Ok(Some(token)) => HttpResponse::ok(token),
            Ok(None) => HttpResponse::error(&ServerError::Unauthorized),
            Err(err) => {
                tracing::error!(error = %err, "authentication failed unexpectedly");
                HttpResponse::server_error()
            },
        }
    }
}

/// Builder for [`LoginRouter`].
#[derive(Default)]
pub struct LoginRouterBuilder {
    auth_use_case: Option<Arc<dyn Authenticate>>,
    email_validator: Option<Arc<dyn EmailValidator>>,
}

impl LoginRouterBuilder {
    pub fn auth_use_case(mut self, auth_use_case: Arc<dyn Authenticate>) -> Self {
        self.auth_use_case = Some(auth_use_case);
        self
    }

    pub fn email_validator(
        mut self,
        email_validator: Arc<dyn EmailValidator>,
    ) -> Self {
        self.email_validator = Some(email_validator);
        self
    }

    pub fn build(self) -> LoginRouter {
        LoginRouter {
            auth_use_case: self.auth_use_case,
            email_validator: self.email_validator,
        }
    }
}

impl FromRef<AppState> for Arc<LoginRouter> {
    fn from_ref(state: &AppState) -> Arc<LoginRouter> {
        Arc::clone(&state.login)
    }
}

/// Handler for `POST /login`.
pub async fn handler(
    State(router): State<Arc<LoginRouter>>,
    body: Result<Json<Value>, JsonRejection>,
) -> HttpResponse {
    let body = match body {
        Ok(Json(value)) => match LoginBody::from_json(&value) {
            Ok(body) => body,
            Err(err) => return HttpResponse::error(&err),
        },
        Err(rejection) => {
            tracing::debug!(%rejection, "login body could not be decoded");
            None
        },
    };

    router.route(Some(HttpRequest { body })).await
}
