//! Claim mirror repository
//!
//! Implements `ClaimStore` over the `eklaim_claims` table. The unique
//! constraint on `eligibility_number` is what finally enforces one claim
//! per eligibility letter when two registrations race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_claims::{Claim, ClaimStatus, ClaimStore, IdrgGrouping, InacbgGrouping, TopUps};

use crate::error::DatabaseError;

const SELECT_CLAIM: &str = r#"
    SELECT
        id, claim_number, eligibility_number, hospital_code, status,
        patient, claim_data, diagnoses, procedures,
        idrg_code, idrg_description, idrg_tariff,
        inacbg_code, inacbg_description, inacbg_base_tariff, inacbg_top_ups, inacbg_total_tariff,
        created_by, updated_by, created_at, updated_at, finalized_at, submitted_at
    FROM eklaim_claims
"#;

/// Database row for a mirrored claim
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: Uuid,
    pub claim_number: String,
    pub eligibility_number: String,
    pub hospital_code: String,
    pub status: i16,
    pub patient: Value,
    pub claim_data: Option<Value>,
    pub diagnoses: Option<Value>,
    pub procedures: Option<Value>,
    pub idrg_code: Option<String>,
    pub idrg_description: Option<String>,
    pub idrg_tariff: Option<Decimal>,
    pub inacbg_code: Option<String>,
    pub inacbg_description: Option<String>,
    pub inacbg_base_tariff: Option<Decimal>,
    pub inacbg_top_ups: Option<Json<TopUps>>,
    pub inacbg_total_tariff: Option<Decimal>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let status = ClaimStatus::from_code(row.status).ok_or_else(|| {
            DatabaseError::InvalidRow(format!("claim {} has unknown status {}", row.claim_number, row.status))
        })?;

        let idrg = match (row.idrg_code, row.idrg_tariff) {
            (Some(code), Some(tariff)) => Some(IdrgGrouping {
                code,
                description: row.idrg_description.unwrap_or_default(),
                tariff,
            }),
            _ => None,
        };

        let inacbg = match (row.inacbg_code, row.inacbg_base_tariff) {
            (Some(code), Some(base_tariff)) => {
                let top_ups = row.inacbg_top_ups.map(|Json(t)| t).unwrap_or_default();
                let mut grouping =
                    InacbgGrouping::new(code, row.inacbg_description.unwrap_or_default(), base_tariff, top_ups)
                        .map_err(|e| DatabaseError::InvalidRow(format!("claim {}: {}", row.claim_number, e)))?;
                if let Some(total) = row.inacbg_total_tariff {
                    grouping.total_tariff = total;
                }
                Some(grouping)
            }
            _ => None,
        };

        Ok(Claim {
            id: ClaimId::from_uuid(row.id),
            claim_number: row.claim_number,
            eligibility_number: row.eligibility_number,
            hospital_code: row.hospital_code,
            status,
            patient: row.patient,
            claim_data: row.claim_data,
            diagnoses: row.diagnoses,
            procedures: row.procedures,
            idrg,
            inacbg,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            finalized_at: row.finalized_at,
            submitted_at: row.submitted_at,
        })
    }
}

/// PostgreSQL-backed claim store
#[derive(Debug, Clone)]
pub struct PgClaimRepository {
    pool: PgPool,
}

impl PgClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> Result<Option<Claim>, DatabaseError> {
        let sql = format!("{} WHERE {} = $1", SELECT_CLAIM, column);
        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Claim::try_from).transpose()
    }
}

impl DomainPort for PgClaimRepository {}

#[async_trait]
impl HealthCheckable for PgClaimRepository {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy("postgres-claim-store", latency_ms),
            Err(e) => HealthCheckResult::unhealthy("postgres-claim-store", latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl ClaimStore for PgClaimRepository {
    #[instrument(skip(self, claim), fields(claim_number = %claim.claim_number))]
    async fn insert(&self, claim: &Claim) -> Result<(), PortError> {
        let idrg = claim.idrg.as_ref();
        let inacbg = claim.inacbg.as_ref();

        sqlx::query(
            r#"
            INSERT INTO eklaim_claims (
                id, claim_number, eligibility_number, hospital_code, status,
                patient, claim_data, diagnoses, procedures,
                idrg_code, idrg_description, idrg_tariff,
                inacbg_code, inacbg_description, inacbg_base_tariff, inacbg_top_ups, inacbg_total_tariff,
                created_by, updated_by, created_at, updated_at, finalized_at, submitted_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            "#,
        )
        .bind(claim.id.as_uuid())
        .bind(&claim.claim_number)
        .bind(&claim.eligibility_number)
        .bind(&claim.hospital_code)
        .bind(claim.status.code())
        .bind(&claim.patient)
        .bind(&claim.claim_data)
        .bind(&claim.diagnoses)
        .bind(&claim.procedures)
        .bind(idrg.map(|g| g.code.clone()))
        .bind(idrg.map(|g| g.description.clone()))
        .bind(idrg.map(|g| g.tariff))
        .bind(inacbg.map(|g| g.code.clone()))
        .bind(inacbg.map(|g| g.description.clone()))
        .bind(inacbg.map(|g| g.base_tariff))
        .bind(inacbg.map(|g| Json(g.top_ups.clone())))
        .bind(inacbg.map(|g| g.total_tariff))
        .bind(&claim.created_by)
        .bind(&claim.updated_by)
        .bind(claim.created_at)
        .bind(claim.updated_at)
        .bind(claim.finalized_at)
        .bind(claim.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        debug!("Claim mirror inserted");
        Ok(())
    }

    #[instrument(skip(self, claim), fields(claim_number = %claim.claim_number))]
    async fn update(&self, claim: &Claim) -> Result<(), PortError> {
        let idrg = claim.idrg.as_ref();
        let inacbg = claim.inacbg.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE eklaim_claims SET
                status = $2,
                claim_data = $3,
                diagnoses = $4,
                procedures = $5,
                idrg_code = $6,
                idrg_description = $7,
                idrg_tariff = $8,
                inacbg_code = $9,
                inacbg_description = $10,
                inacbg_base_tariff = $11,
                inacbg_top_ups = $12,
                inacbg_total_tariff = $13,
                updated_by = $14,
                updated_at = $15,
                finalized_at = $16,
                submitted_at = $17
            WHERE claim_number = $1
            "#,
        )
        .bind(&claim.claim_number)
        .bind(claim.status.code())
        .bind(&claim.claim_data)
        .bind(&claim.diagnoses)
        .bind(&claim.procedures)
        .bind(idrg.map(|g| g.code.clone()))
        .bind(idrg.map(|g| g.description.clone()))
        .bind(idrg.map(|g| g.tariff))
        .bind(inacbg.map(|g| g.code.clone()))
        .bind(inacbg.map(|g| g.description.clone()))
        .bind(inacbg.map(|g| g.base_tariff))
        .bind(inacbg.map(|g| Json(g.top_ups.clone())))
        .bind(inacbg.map(|g| g.total_tariff))
        .bind(&claim.updated_by)
        .bind(claim.updated_at)
        .bind(claim.finalized_at)
        .bind(claim.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Claim", &claim.claim_number));
        }
        Ok(())
    }

    async fn find_by_claim_number(&self, claim_number: &str) -> Result<Option<Claim>, PortError> {
        Ok(self.fetch_one_where("claim_number", claim_number).await?)
    }

    async fn find_by_eligibility_number(&self, eligibility_number: &str) -> Result<Option<Claim>, PortError> {
        Ok(self.fetch_one_where("eligibility_number", eligibility_number).await?)
    }
}
