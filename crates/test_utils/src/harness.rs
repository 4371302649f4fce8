//! Gateway wiring for integration tests
//!
//! Assembles a `ClaimGateway` over the in-memory stores with either the
//! real reqwest transport (pointed at a `FakeEklaim`) or any other audit
//! store a test wants to substitute.

use std::sync::Arc;
use std::time::Duration;

use domain_claims::ports::mock::{InMemoryAuditStore, InMemoryClaimStore, InMemoryConfigStore};
use domain_claims::{AuditStore, AuditWriter, ClaimGateway};
use infra_eklaim::{HttpConfig, RateLimiterRegistry, ResilientClient, RetryPolicy};

use crate::fake_eklaim::FakeEklaim;

/// Backoff used by harness clients so retry tests finish quickly
pub const FAST_RETRY: RetryPolicy = RetryPolicy {
    base_delay: Duration::from_millis(5),
    max_delay: Duration::from_millis(50),
};

pub struct GatewayHarness {
    pub gateway: ClaimGateway,
    pub claims: InMemoryClaimStore,
    pub configs: InMemoryConfigStore,
    pub audit: InMemoryAuditStore,
    pub limiter: RateLimiterRegistry,
}

impl GatewayHarness {
    /// Gateway talking HTTP to `fake`, auditing into memory
    pub async fn over_http(fake: &FakeEklaim) -> Self {
        let audit = InMemoryAuditStore::new();
        Self::build(fake, audit.clone(), Arc::new(audit)).await
    }

    /// Same wiring with a caller-supplied audit store
    pub async fn with_audit_store(fake: &FakeEklaim, store: Arc<dyn AuditStore>) -> Self {
        Self::build(fake, InMemoryAuditStore::new(), store).await
    }

    async fn build(fake: &FakeEklaim, audit: InMemoryAuditStore, store: Arc<dyn AuditStore>) -> Self {
        let claims = InMemoryClaimStore::new();
        let configs = InMemoryConfigStore::with_configs(vec![fake.config_record()]).await;
        let limiter = RateLimiterRegistry::new();

        let http = HttpConfig::default().with_timeout(Duration::from_secs(5));
        let client = match ResilientClient::from_http_config(&http, limiter.clone()) {
            Ok(client) => client.with_retry_policy(FAST_RETRY),
            Err(e) => panic!("reqwest client must build: {}", e),
        };

        let gateway = ClaimGateway::new(
            client,
            Arc::new(claims.clone()),
            Arc::new(configs.clone()),
            AuditWriter::spawn(store),
        );

        Self { gateway, claims, configs, audit, limiter }
    }
}
