//! Audit trail for E-Klaim calls
//!
//! One [`AuditLogEntry`] per attempted lifecycle call, successful or not.
//! Entries are handed to [`AuditWriter::record`], which queues them for a
//! background worker. The worker writes through the [`AuditStore`] port in
//! its own persistence context, so a failed audit write never touches the
//! business update and a failed business update never loses its audit entry.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use core_kernel::{AuditEventId, ClaimId, PortError, RequestContext};

use crate::ports::AuditStore;

/// Retention period for audit entries
pub const RETENTION_MONTHS: u32 = 60;

/// Default page size for audit queries
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Largest page an audit query may request
pub const MAX_PAGE_SIZE: i64 = 500;

/// One attempted E-Klaim call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEventId,
    pub claim_id: Option<ClaimId>,
    pub claim_number: Option<String>,
    /// Remote action name, e.g. `grouper`
    pub action: String,
    pub http_method: String,
    pub request_plain: Option<String>,
    pub request_encrypted: Option<String>,
    /// Absent when no response was received or it could not be decrypted
    pub response_plain: Option<String>,
    pub response_encrypted: Option<String>,
    pub http_status: Option<u16>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub actor_id: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Starts an entry for `action` attributed to the request context
    pub fn new(action: impl Into<String>, http_method: impl Into<String>, ctx: &RequestContext) -> Self {
        Self {
            id: AuditEventId::new(),
            claim_id: None,
            claim_number: None,
            action: action.into(),
            http_method: http_method.into(),
            request_plain: None,
            request_encrypted: None,
            response_plain: None,
            response_encrypted: None,
            http_status: None,
            error_kind: None,
            error_message: None,
            attempts: 0,
            elapsed_ms: 0,
            actor_id: ctx.actor_id.clone(),
            client_ip: ctx.client_ip.clone(),
            user_agent: ctx.user_agent.clone(),
            correlation_id: ctx.correlation_id.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}

/// Filter for audit searches; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub claim_id: Option<ClaimId>,
    pub claim_number: Option<String>,
    pub action: Option<String>,
    pub actor_id: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQuery {
    pub fn for_claim(claim_id: ClaimId) -> Self {
        Self { claim_id: Some(claim_id), ..Default::default() }
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Returns true if `entry` satisfies every filter
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.claim_id.map_or(true, |id| entry.claim_id == Some(id))
            && self
                .claim_number
                .as_ref()
                .map_or(true, |n| entry.claim_number.as_ref() == Some(n))
            && self.action.as_ref().map_or(true, |a| &entry.action == a)
            && self.actor_id.as_ref().map_or(true, |a| &entry.actor_id == a)
            && self.from.map_or(true, |from| entry.created_at >= from)
            && self.to.map_or(true, |to| entry.created_at < to)
    }
}

enum AuditCommand {
    Record(Box<AuditLogEntry>),
    Flush(oneshot::Sender<()>),
}

/// Asynchronous, failure-isolated audit writer
///
/// Cloning shares the same worker. The worker stops once every clone has
/// been dropped and the queue is drained.
#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::UnboundedSender<AuditCommand>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    /// Spawns the background worker on the current tokio runtime
    pub fn spawn(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditCommand>();
        let worker_store = Arc::clone(&store);

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    AuditCommand::Record(entry) => {
                        if let Err(e) = worker_store.append(&entry).await {
                            error!(
                                audit_id = %entry.id,
                                action = %entry.action,
                                claim_number = ?entry.claim_number,
                                error = %e,
                                "Failed to persist audit entry"
                            );
                        } else {
                            debug!(audit_id = %entry.id, action = %entry.action, "Audit entry persisted");
                        }
                    }
                    AuditCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Audit worker stopped");
        });

        Self { tx, store }
    }

    /// Queues an entry; never blocks and never fails the caller
    pub fn record(&self, entry: AuditLogEntry) {
        if let Err(rejected) = self.tx.send(AuditCommand::Record(Box::new(entry))) {
            if let AuditCommand::Record(entry) = rejected.0 {
                error!(audit_id = %entry.id, action = %entry.action, "Audit worker is gone, entry dropped");
            }
        }
    }

    /// Waits until every entry recorded before this call has been handled
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Full history of one claim, newest first
    pub async fn by_claim(&self, claim_id: ClaimId) -> Result<Vec<AuditLogEntry>, PortError> {
        self.search_all(&AuditQuery::for_claim(claim_id)).await
    }

    pub async fn by_action(&self, action: &str) -> Result<Vec<AuditLogEntry>, PortError> {
        self.search_all(&AuditQuery { action: Some(action.to_string()), ..Default::default() }).await
    }

    pub async fn by_actor(&self, actor_id: &str) -> Result<Vec<AuditLogEntry>, PortError> {
        self.search_all(&AuditQuery { actor_id: Some(actor_id.to_string()), ..Default::default() }).await
    }

    pub async fn by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditLogEntry>, PortError> {
        self.search_all(&AuditQuery { from: Some(from), to: Some(to), ..Default::default() }).await
    }

    /// Every entry matching the filters of `query`, newest first
    ///
    /// Reads the store `MAX_PAGE_SIZE` entries at a time until a short page
    /// comes back. `query.limit` and `query.offset` are ignored. Entries
    /// appended while paging can shift a page boundary, so results are
    /// de-duplicated by id.
    pub async fn search_all(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError> {
        let mut page = AuditQuery { limit: Some(MAX_PAGE_SIZE), offset: Some(0), ..query.clone() };
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        loop {
            let batch = self.store.search(&page).await?;
            let fetched = batch.len() as i64;
            entries.extend(batch.into_iter().filter(|e| seen.insert(e.id)));

            if fetched < MAX_PAGE_SIZE {
                return Ok(entries);
            }
            page.offset = Some(page.page_offset() + fetched);
        }
    }

    /// Combined search, newest first
    pub async fn search(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError> {
        self.store.search(query).await
    }

    /// Deletes entries strictly older than `cutoff`
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, PortError> {
        let removed = self.store.delete_older_than(cutoff).await?;
        info!(%cutoff, removed, "Pruned audit entries");
        Ok(removed)
    }

    /// Oldest timestamp still inside the retention period
    pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(RETENTION_MONTHS)).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl std::fmt::Debug for AuditWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditWriter").finish_non_exhaustive()
    }
}
