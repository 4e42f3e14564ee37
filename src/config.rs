//! Configuration manager for autha-login.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 5858;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port.
    pub port: u16,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to access token configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to traces, logs and metrics export.
    #[serde(skip_serializing)]
    pub telemetry: Telemetry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            url: String::default(),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            token: None,
            argon2: None,
            telemetry: Telemetry::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
    /// Full connection string, takes precedence over other fields.
    #[serde(skip)]
    pub url: Option<String>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Access token configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    /// HMAC secret used to sign tokens.
    pub secret: String,
    /// Update token audience.
    /// Default is `account.gravitalia.com`.
    pub audience: Option<String>,
    /// Token lifetime in seconds.
    pub expiration: Option<u64>,
}

/// Telemetry configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    /// OTLP gRPC endpoint for spans and logs.
    pub otlp_endpoint: Option<String>,
    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default)]
    pub metrics: bool,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();

        if !config.url.is_empty() {
            config.url = Self::normalize_url(&config.url)?;
        }

        config.apply_env(|key| env::var(key).ok());

        Ok(Arc::new(config))
    }

    /// Override file values with `PORT`, `TOKEN_SECRET` and `DATABASE_URL`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(%port, "ignoring invalid `PORT`"),
            }
        }

        if let Some(secret) = var("TOKEN_SECRET").filter(|s| !s.is_empty()) {
            self.token.get_or_insert_with(Token::default).secret = secret;
        }

        if let Some(url) = var("DATABASE_URL").filter(|s| !s.is_empty()) {
            self.postgres.get_or_insert_with(Postgres::default).url = Some(url);
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self::default()
    }
}
