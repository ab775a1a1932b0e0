//! Layered configuration for the evaluation service
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, or `agent-evals.toml` in the working directory if present)
//! 3. `AGENT_EVALS__<SECTION>__<KEY>` environment variables
//!
//! CLI flags applied by the binary override all of these.

use crate::error::{EvalError, Result};
use crate::source::DataSourceKind;
use crate::storage::libsql::ConnectionMode;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "AGENT_EVALS";

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "agent-evals.toml";

/// Top-level service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:3000`
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| config_error(format!("Invalid server address '{}': {}", self.addr, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// File path, `:memory:`, or a `libsql://` URL
    pub location: Option<String>,
    /// Environment variable holding the remote auth token
    pub auth_token_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            location: None,
            auth_token_env: "AGENT_EVALS_DB_TOKEN".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Configured location, or the per-user default database file
    pub fn location(&self) -> String {
        self.location
            .clone()
            .unwrap_or_else(|| default_db_path().to_string_lossy().into_owned())
    }

    pub fn connection_mode(&self) -> Result<ConnectionMode> {
        let token = env::var(&self.auth_token_env).ok();
        ConnectionMode::from_location(&self.location(), token)
    }
}

/// Maps a bearer token to the owner it authenticates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOwner {
    pub token: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the owner id resolved by the fronting gateway
    pub owner_header: String,
    /// Accept `owner_header` at all; disable when the service is exposed directly
    pub trust_owner_header: bool,
    pub tokens: Vec<TokenOwner>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            owner_header: "x-owner-id".to_string(),
            trust_owner_header: true,
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_source: DataSourceKind,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// An explicit `path` must exist; the implicit `agent-evals.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        debug!(
            "Loaded configuration (data source: {}, {} bearer tokens)",
            config.dashboard.data_source,
            config.auth.tokens.len()
        );
        Ok(config)
    }
}

/// Default database file under the user's local data directory
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-evals")
        .join("evals.db")
}

fn config_error(message: String) -> EvalError {
    EvalError::Config(config::ConfigError::Message(message))
}
