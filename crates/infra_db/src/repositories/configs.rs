//! Provider configuration repository
//!
//! Read-only view of `eklaim_configs`. Rows are maintained by the hospital
//! back office; the gateway only reads active ones.

use async_trait::async_trait;
use sqlx::PgPool;

use core_kernel::{DomainPort, PortError};
use domain_claims::ConfigStore;
use infra_eklaim::EklaimConfigRecord;

use crate::error::DatabaseError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConfigRow {
    pub hospital_code: String,
    pub consumer_id: String,
    pub user_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub requests_per_minute: i32,
    pub max_retry_attempts: i32,
}

impl From<ConfigRow> for EklaimConfigRecord {
    fn from(row: ConfigRow) -> Self {
        Self {
            hospital_code: row.hospital_code,
            consumer_id: row.consumer_id,
            user_key: row.user_key,
            secret_key: row.secret_key,
            base_url: row.base_url,
            // negative values are rejected by a CHECK constraint
            requests_per_minute: u32::try_from(row.requests_per_minute).unwrap_or(0),
            max_retry_attempts: u32::try_from(row.max_retry_attempts).unwrap_or(0),
        }
    }
}

/// PostgreSQL-backed provider configuration store
#[derive(Debug, Clone)]
pub struct PgConfigRepository {
    pool: PgPool,
}

impl PgConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the configuration for a hospital
    pub async fn upsert(&self, record: &EklaimConfigRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO eklaim_configs (
                hospital_code, consumer_id, user_key, secret_key, base_url,
                requests_per_minute, max_retry_attempts, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (hospital_code) DO UPDATE SET
                consumer_id = EXCLUDED.consumer_id,
                user_key = EXCLUDED.user_key,
                secret_key = EXCLUDED.secret_key,
                base_url = EXCLUDED.base_url,
                requests_per_minute = EXCLUDED.requests_per_minute,
                max_retry_attempts = EXCLUDED.max_retry_attempts,
                is_active = TRUE,
                updated_at = NOW()
            "#,
        )
        .bind(&record.hospital_code)
        .bind(&record.consumer_id)
        .bind(&record.user_key)
        .bind(&record.secret_key)
        .bind(&record.base_url)
        .bind(i32::try_from(record.requests_per_minute).unwrap_or(i32::MAX))
        .bind(i32::try_from(record.max_retry_attempts).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl DomainPort for PgConfigRepository {}

#[async_trait]
impl ConfigStore for PgConfigRepository {
    async fn find_by_hospital(&self, hospital_code: &str) -> Result<Option<EklaimConfigRecord>, PortError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT hospital_code, consumer_id, user_key, secret_key, base_url,
                   requests_per_minute, max_retry_attempts
            FROM eklaim_configs
            WHERE hospital_code = $1 AND is_active
            "#,
        )
        .bind(hospital_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(EklaimConfigRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_maps_to_record() {
        let record = EklaimConfigRecord::from(ConfigRow {
            hospital_code: "3171015".into(),
            consumer_id: "cons".into(),
            user_key: "uk".into(),
            secret_key: "ab".repeat(32),
            base_url: "https://eklaim.test/ws".into(),
            requests_per_minute: 30,
            max_retry_attempts: -1,
        });
        assert_eq!(record.requests_per_minute, 30);
        assert_eq!(record.max_retry_attempts, 0);
    }
}
