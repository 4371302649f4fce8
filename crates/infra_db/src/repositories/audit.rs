//! Audit log repository
//!
//! Every append runs as its own auto-committed statement on the pool, never
//! inside a caller's transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{AuditEventId, ClaimId, DomainPort, PortError};
use domain_claims::{AuditLogEntry, AuditQuery, AuditStore};

use crate::error::DatabaseError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    pub id: Uuid,
    pub claim_id: Option<Uuid>,
    pub claim_number: Option<String>,
    pub action: String,
    pub http_method: String,
    pub request_plain: Option<String>,
    pub request_encrypted: Option<String>,
    pub response_plain: Option<String>,
    pub response_encrypted: Option<String>,
    pub http_status: Option<i32>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub elapsed_ms: i64,
    pub actor_id: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditLogEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: AuditEventId::from_uuid(row.id),
            claim_id: row.claim_id.map(ClaimId::from_uuid),
            claim_number: row.claim_number,
            action: row.action,
            http_method: row.http_method,
            request_plain: row.request_plain,
            request_encrypted: row.request_encrypted,
            response_plain: row.response_plain,
            response_encrypted: row.response_encrypted,
            http_status: row.http_status.and_then(|s| u16::try_from(s).ok()),
            error_kind: row.error_kind,
            error_message: row.error_message,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            elapsed_ms: u64::try_from(row.elapsed_ms).unwrap_or(0),
            actor_id: row.actor_id,
            client_ip: row.client_ip,
            user_agent: row.user_agent,
            correlation_id: row.correlation_id,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed audit store
#[derive(Debug, Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgAuditRepository {}

#[async_trait]
impl AuditStore for PgAuditRepository {
    #[instrument(skip(self, entry), fields(audit_id = %entry.id, action = %entry.action))]
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), PortError> {
        sqlx::query(
            r#"
            INSERT INTO eklaim_audit_logs (
                id, claim_id, claim_number, action, http_method,
                request_plain, request_encrypted, response_plain, response_encrypted,
                http_status, error_kind, error_message, attempts, elapsed_ms,
                actor_id, client_ip, user_agent, correlation_id, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.claim_id.map(Uuid::from))
        .bind(&entry.claim_number)
        .bind(&entry.action)
        .bind(&entry.http_method)
        .bind(&entry.request_plain)
        .bind(&entry.request_encrypted)
        .bind(&entry.response_plain)
        .bind(&entry.response_encrypted)
        .bind(entry.http_status.map(i32::from))
        .bind(&entry.error_kind)
        .bind(&entry.error_message)
        .bind(i32::try_from(entry.attempts).unwrap_or(i32::MAX))
        .bind(i64::try_from(entry.elapsed_ms).unwrap_or(i64::MAX))
        .bind(&entry.actor_id)
        .bind(&entry.client_ip)
        .bind(&entry.user_agent)
        .bind(&entry.correlation_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(())
    }

    async fn search(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, PortError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT
                id, claim_id, claim_number, action, http_method,
                request_plain, request_encrypted, response_plain, response_encrypted,
                http_status, error_kind, error_message, attempts, elapsed_ms,
                actor_id, client_ip, user_agent, correlation_id, created_at
            FROM eklaim_audit_logs
            WHERE ($1::uuid IS NULL OR claim_id = $1)
              AND ($2::text IS NULL OR claim_number = $2)
              AND ($3::text IS NULL OR action = $3)
              AND ($4::text IS NULL OR actor_id = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at < $6)
            ORDER BY created_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(query.claim_id.map(Uuid::from))
        .bind(&query.claim_number)
        .bind(&query.action)
        .bind(&query.actor_id)
        .bind(query.from)
        .bind(query.to)
        .bind(query.page_size())
        .bind(query.page_offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows.into_iter().map(AuditLogEntry::from).collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, PortError> {
        let result = sqlx::query("DELETE FROM eklaim_audit_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        Ok(result.rows_affected())
    }
}
