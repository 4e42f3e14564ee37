//! Autha login authenticates users by email and password and issues access
//! tokens.

#![forbid(unsafe_code)]
pub mod config;
pub mod crypto;
pub mod database;
pub mod email;
pub mod error;
pub mod ports;
pub mod router;
pub mod telemetry;
pub mod token;
pub mod usecases;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::config::Configuration;
use crate::crypto::Argon2Encrypter;
use crate::database::Database;
use crate::email::SyntaxEmailValidator;
use crate::router::login::LoginRouter;
use crate::token::JwtTokenGenerator;
use crate::usecases::AuthUseCase;
use crate::user::PgUserRepository;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub login: Arc<LoginRouter>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    let mut routes = Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler));

    if let Some(handle) = state.metrics.clone() {
        // `GET /metrics` renders Prometheus exposition format.
        routes = routes.route(
            "/metrics",
            get(move || std::future::ready(handle.render())),
        );
    }

    routes
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
///
/// Returns the database handle as well, so the caller owns its lifecycle.
pub async fn initialize_state(
    config: Arc<Configuration>,
    metrics: Option<PrometheusHandle>,
) -> Result<(AppState, Database), Box<dyn std::error::Error>> {
    let Some(token) = &config.token else {
        return Err("missing `token` entry on `config.yaml` file".into());
    };
    let mut token_generator = JwtTokenGenerator::new(&config.url, &token.secret)?;
    if let Some(audience) = &token.audience {
        token_generator = token_generator.with_audience(audience);
    }
    if let Some(expiration) = token.expiration {
        token_generator = token_generator.with_expiration(expiration);
    }

    let encrypter = Argon2Encrypter::new(config.argon2.clone())?;

    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on `config.yaml` file".into());
    };
    let db = Database::new(postgres).await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    let repository = Arc::new(PgUserRepository::new(db.postgres.clone()));
    let auth_use_case = AuthUseCase::builder()
        .load_user_by_email_repository(repository.clone())
        .encrypter(Arc::new(encrypter))
        .token_generator(Arc::new(token_generator))
        .update_access_token_repository(repository)
        .build();

    let login = LoginRouter::builder()
        .auth_use_case(Arc::new(auth_use_case))
        .email_validator(Arc::new(SyntaxEmailValidator))
        .build();

    Ok((
        AppState {
            config,
            login: Arc::new(login),
            metrics,
        },
        db,
    ))
}
