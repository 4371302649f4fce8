//! Database connection pool management
//!
//! Pool construction for the gateway's PostgreSQL store and the embedded
//! migrations that create the `eklaim_*` tables.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Postgres `application_name` reported by gateway connections
pub const APPLICATION_NAME: &str = "eklaim-gateway";

/// Connection pool settings
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/eklaim")
///     .max_connections(20)
///     .connect_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_connections, 20);
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Maximum pool size (default: 10)
    pub max_connections: u32,
    /// Connections kept open when idle (default: 2)
    pub min_connections: u32,
    /// How long to wait for a free connection (default: 30s)
    pub connect_timeout: Duration,
    /// Connections are recycled after this long (default: 30 min)
    pub max_lifetime: Duration,
    /// Idle connections are closed after this long (default: 10 min)
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    /// Creates a configuration for the given connection URL
    ///
    /// # Arguments
    ///
    /// * `url` - PostgreSQL connection string (e.g., "postgres://gateway:secret@db/eklaim")
    ///
    /// # Returns
    ///
    /// A `DatabaseConfig` with the defaults listed on each field
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }

    /// Sets the maximum pool size
    ///
    /// # Arguments
    ///
    /// * `max` - Upper bound on open connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the number of connections kept warm
    ///
    /// # Arguments
    ///
    /// * `min` - Connections held open while idle
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets how long an acquire may wait
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the age after which a connection is recycled
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/eklaim")
    }
}

/// Opens the connection pool
///
/// Every connection reports [`APPLICATION_NAME`] to the server so gateway
/// sessions can be told apart in `pg_stat_activity`.
///
/// # Arguments
///
/// * `config` - Pool settings
///
/// # Returns
///
/// The connected pool
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the URL is malformed or the
/// first connection cannot be established.
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::{create_pool, run_migrations, DatabaseConfig};
///
/// let pool = create_pool(DatabaseConfig::new(database_url)).await?;
/// run_migrations(&pool).await?;
/// ```
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database pool"
    );

    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
        .application_name(APPLICATION_NAME);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("Database pool created");
    Ok(pool)
}

/// Applies the embedded migrations
///
/// Already-applied migrations are skipped, so this is safe on every start.
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if a migration fails or the
/// recorded checksums no longer match the embedded files.
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

    info!("Database migrations applied");
    Ok(())
}
