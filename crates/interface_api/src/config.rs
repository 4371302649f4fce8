//! API configuration

use serde::Deserialize;
use std::time::Duration;

/// Log output format for the server binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API configuration
///
/// Every field has a default, so a partial environment is enough to start
/// a development server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Maximum database pool size
    pub database_max_connections: u32,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    /// Per-attempt HTTP timeout towards E-Klaim, in seconds
    pub eklaim_http_timeout_secs: u64,
    /// Upper bound on a whole E-Klaim call including retries, in seconds
    pub eklaim_call_timeout_secs: u64,
    /// How often expired audit entries are pruned, in seconds
    pub audit_prune_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/eklaim".to_string(),
            database_max_connections: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            eklaim_http_timeout_secs: 30,
            eklaim_call_timeout_secs: 150,
            audit_prune_interval_secs: 24 * 60 * 60,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn eklaim_http_timeout(&self) -> Duration {
        Duration::from_secs(self.eklaim_http_timeout_secs)
    }

    pub fn eklaim_call_timeout(&self) -> Duration {
        Duration::from_secs(self.eklaim_call_timeout_secs)
    }

    pub fn audit_prune_interval(&self) -> Duration {
        // tokio::time::interval panics on a zero period
        Duration::from_secs(self.audit_prune_interval_secs.max(1))
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("database_max_connections", &self.database_max_connections)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("eklaim_http_timeout_secs", &self.eklaim_http_timeout_secs)
            .field("eklaim_call_timeout_secs", &self.eklaim_call_timeout_secs)
            .field("audit_prune_interval_secs", &self.audit_prune_interval_secs)
            .finish_non_exhaustive()
    }
}
