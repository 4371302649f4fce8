//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container and applies the gateway
//! migrations. Tests using it need a Docker daemon and are `#[ignore]`d by
//! default.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

use infra_db::{create_pool, run_migrations, DatabaseConfig};

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "eklaim_test";

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container with the schema migrated
    ///
    /// The container is stopped when the returned value is dropped.
    ///
    /// # Returns
    ///
    /// A `TestDatabase` whose pool points at the fresh container
    ///
    /// # Errors
    ///
    /// Fails if the container cannot be started or the migrations do not
    /// apply.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let db = TestDatabase::new().await?;
    /// let repo = PgClaimRepository::new(db.pool().clone());
    /// ```
    pub async fn new() -> TestResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig { host, port, ..Default::default() };

        let pool = create_pool(
            DatabaseConfig::new(config.connection_url())
                .max_connections(5)
                .min_connections(1)
                .connect_timeout(Duration::from_secs(30)),
        )
        .await?;
        run_migrations(&pool).await?;

        Ok(Self { _container: container, config, pool })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data from the database while preserving the schema
    ///
    /// # Errors
    ///
    /// Propagates the first failed `TRUNCATE`.
    pub async fn clear_data(&self) -> TestResult<()> {
        for table in ["eklaim_audit_logs", "eklaim_claims", "eklaim_configs"] {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

/// Global test database for shared integration tests
///
/// Bound to the runtime that first initialises it, so only tests sharing one
/// runtime may use it.
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// One container serves every test in the binary; tests must use distinct
/// eligibility numbers or call `clear_data`.
pub async fn get_shared_test_database() -> TestResult<Arc<TestDatabase>> {
    SHARED_TEST_DB
        .get_or_try_init(|| async { TestDatabase::new().await.map(Arc::new) })
        .await
        .cloned()
}
