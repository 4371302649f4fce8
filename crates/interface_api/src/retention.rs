//! Scheduled audit retention
//!
//! Audit entries are kept for `RETENTION_MONTHS`; this task deletes older
//! rows on a fixed cadence for the lifetime of the server.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::error;

use domain_claims::AuditWriter;

/// Prunes once, relative to `now`; failures are logged and swallowed
pub async fn prune_expired(audit: &AuditWriter, now: DateTime<Utc>) -> Option<u64> {
    let cutoff = AuditWriter::retention_cutoff(now);
    match audit.prune_older_than(cutoff).await {
        Ok(removed) => Some(removed),
        Err(e) => {
            error!(%cutoff, error = %e, "Audit retention prune failed");
            None
        }
    }
}

/// Runs `prune_expired` immediately and then every `every`
pub fn spawn_audit_retention(audit: AuditWriter, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            prune_expired(&audit, Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;
    use core_kernel::RequestContext;
    use domain_claims::ports::mock::InMemoryAuditStore;
    use domain_claims::{AuditLogEntry, AuditStore};
    use std::sync::Arc;

    async fn seeded_store(now: DateTime<Utc>) -> InMemoryAuditStore {
        let store = InMemoryAuditStore::new();
        let ctx = RequestContext::system();

        let mut expired = AuditLogEntry::new("new_claim", "POST", &ctx);
        expired.created_at = now.checked_sub_months(Months::new(61)).unwrap();
        let mut kept = AuditLogEntry::new("grouper", "POST", &ctx);
        kept.created_at = now.checked_sub_months(Months::new(59)).unwrap();

        store.append(&expired).await.unwrap();
        store.append(&kept).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired_entries() {
        let now = Utc::now();
        let store = seeded_store(now).await;
        let audit = AuditWriter::spawn(Arc::new(store.clone()));

        assert_eq!(prune_expired(&audit, now).await, Some(1));
        let left = store.entries().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].action, "grouper");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_prunes_on_start() {
        let store = seeded_store(Utc::now()).await;
        let audit = AuditWriter::spawn(Arc::new(store.clone()));

        let handle = spawn_audit_retention(audit, Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.len().await, 1);
        handle.abort();
    }
}
