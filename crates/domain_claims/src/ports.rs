//! Claims Gateway Ports
//!
//! The gateway owns none of its storage. The claim mirror, the per-hospital
//! provider configuration and the audit trail are reached through the port
//! traits below.
//!
//! - **PostgreSQL adapters**: `infra_db::repositories`
//! - **In-memory adapters**: [`mock`], for tests and local runs
//!
//! ```rust,ignore
//! let gateway = ClaimGateway::new(
//!     client,
//!     Arc::new(PgClaimRepository::new(pool.clone())),
//!     Arc::new(PgConfigRepository::new(pool.clone())),
//!     AuditWriter::spawn(Arc::new(PgAuditRepository::new(pool))),
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, HealthCheckable, PortError};
use infra_eklaim::EklaimConfigRecord;

use crate::audit::{AuditLogEntry, AuditQuery};
use crate::claim::Claim;

/// Persistence for the claim mirror
#[async_trait]
pub trait ClaimStore: DomainPort + HealthCheckable {
    /// Inserts a new claim
    ///
    /// Returns `PortError::Conflict` if a claim already exists for the same
    /// eligibility number or claim number.
    async fn insert(&self, claim: &Claim) -> Result<(), PortError>;

    /// Overwrites an existing claim (last writer wins)
    async fn update(&self, claim: &Claim) -> Result<(), PortError>;

    async fn find_by_claim_number(&self, claim_number: &str) -> Result<Option<Claim>, PortError>;

    async fn find_by_eligibility_number(&self, eligibility_number: &str) -> Result<Option<Claim>, PortError>;
}

/// Read access to provider configuration
#[async_trait]
pub trait ConfigStore: DomainPort {
    async fn find_by_hospital(&self, hospital_code: &str) -> Result<Option<EklaimConfigRecord>, PortError>;
}

/// Append-only audit storage
#[async_trait]
pub trait AuditStore: DomainPort {
    /// Persists one entry in its own transaction
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), PortError>;

    /// Entries matching `query`, newest first, paged
    async fn search(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError>;

    /// Deletes entries with `created_at < cutoff`, returning how many went
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, PortError>;
}

/// In-memory adapters
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::HealthCheckResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Claim store keyed by claim number
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryClaimStore {
        claims: Arc<RwLock<HashMap<String, Claim>>>,
    }

    impl InMemoryClaimStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.claims.read().await.len()
        }
    }

    impl DomainPort for InMemoryClaimStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryClaimStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("in-memory-claim-store", 0)
        }
    }

    #[async_trait]
    impl ClaimStore for InMemoryClaimStore {
        async fn insert(&self, claim: &Claim) -> Result<(), PortError> {
            let mut claims = self.claims.write().await;
            if claims.contains_key(&claim.claim_number) {
                return Err(PortError::conflict(format!("claim number {} exists", claim.claim_number)));
            }
            if claims.values().any(|c| c.eligibility_number == claim.eligibility_number) {
                return Err(PortError::conflict(format!(
                    "eligibility number {} exists",
                    claim.eligibility_number
                )));
            }
            claims.insert(claim.claim_number.clone(), claim.clone());
            Ok(())
        }

        async fn update(&self, claim: &Claim) -> Result<(), PortError> {
            let mut claims = self.claims.write().await;
            match claims.get_mut(&claim.claim_number) {
                Some(existing) => {
                    *existing = claim.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Claim", &claim.claim_number)),
            }
        }

        async fn find_by_claim_number(&self, claim_number: &str) -> Result<Option<Claim>, PortError> {
            Ok(self.claims.read().await.get(claim_number).cloned())
        }

        async fn find_by_eligibility_number(&self, eligibility_number: &str) -> Result<Option<Claim>, PortError> {
            Ok(self
                .claims
                .read()
                .await
                .values()
                .find(|c| c.eligibility_number == eligibility_number)
                .cloned())
        }
    }

    /// Provider configurations keyed by hospital code
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryConfigStore {
        configs: Arc<RwLock<HashMap<String, EklaimConfigRecord>>>,
    }

    impl InMemoryConfigStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_configs(records: Vec<EklaimConfigRecord>) -> Self {
            let store = Self::new();
            for record in records {
                store.put(record).await;
            }
            store
        }

        pub async fn put(&self, record: EklaimConfigRecord) {
            self.configs.write().await.insert(record.hospital_code.clone(), record);
        }
    }

    impl DomainPort for InMemoryConfigStore {}

    #[async_trait]
    impl ConfigStore for InMemoryConfigStore {
        async fn find_by_hospital(&self, hospital_code: &str) -> Result<Option<EklaimConfigRecord>, PortError> {
            Ok(self.configs.read().await.get(hospital_code).cloned())
        }
    }

    /// Audit store backed by a vector
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryAuditStore {
        entries: Arc<RwLock<Vec<AuditLogEntry>>>,
    }

    impl InMemoryAuditStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.entries.read().await.len()
        }

        /// Every entry in insertion order
        pub async fn entries(&self) -> Vec<AuditLogEntry> {
            self.entries.read().await.clone()
        }
    }

    impl DomainPort for InMemoryAuditStore {}

    #[async_trait]
    impl AuditStore for InMemoryAuditStore {
        async fn append(&self, entry: &AuditLogEntry) -> Result<(), PortError> {
            self.entries.write().await.push(entry.clone());
            Ok(())
        }

        async fn search(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError> {
            let mut found: Vec<AuditLogEntry> = self
                .entries
                .read()
                .await
                .iter()
                .filter(|e| query.matches(e))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

            Ok(found
                .into_iter()
                .skip(query.page_offset() as usize)
                .take(query.page_size() as usize)
                .collect())
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, PortError> {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|e| e.created_at >= cutoff);
            Ok((before - entries.len()) as u64)
        }
    }

    /// Audit store whose writes always fail
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FailingAuditStore;

    impl DomainPort for FailingAuditStore {}

    #[async_trait]
    impl AuditStore for FailingAuditStore {
        async fn append(&self, _entry: &AuditLogEntry) -> Result<(), PortError> {
            Err(PortError::connection("audit database unavailable"))
        }

        async fn search(&self, _query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError> {
            Err(PortError::connection("audit database unavailable"))
        }

        async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64, PortError> {
            Err(PortError::connection("audit database unavailable"))
        }
    }
}
