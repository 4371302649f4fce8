//! Claim mirror
//!
//! Local copy of a claim held by E-Klaim. The gateway creates it when the
//! remote service assigns a claim number and updates it after every
//! successful lifecycle call. It is never deleted here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use core_kernel::ClaimId;
use crate::error::ClaimError;

/// Claim lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Registered with E-Klaim, no clinical data yet
    Draft,
    /// Claim data, diagnoses or procedures have been sent
    DataEntered,
    /// iDRG grouping result received
    GroupedIdrg,
    /// INACBG grouping result and tariff received
    GroupedInacbg,
    /// Locked for submission
    Finalized,
    /// Sent to the insurer
    Submitted,
}

impl ClaimStatus {
    /// Stable integer code stored in the mirror table
    pub fn code(&self) -> i16 {
        match self {
            ClaimStatus::Draft => 1,
            ClaimStatus::DataEntered => 2,
            ClaimStatus::GroupedIdrg => 3,
            ClaimStatus::GroupedInacbg => 4,
            ClaimStatus::Finalized => 5,
            ClaimStatus::Submitted => 6,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(ClaimStatus::Draft),
            2 => Some(ClaimStatus::DataEntered),
            3 => Some(ClaimStatus::GroupedIdrg),
            4 => Some(ClaimStatus::GroupedInacbg),
            5 => Some(ClaimStatus::Finalized),
            6 => Some(ClaimStatus::Submitted),
            _ => None,
        }
    }

    /// Status reached by applying `event`, or `None` if not allowed
    pub fn next(self, event: ClaimEvent) -> Option<ClaimStatus> {
        use ClaimEvent::*;
        use ClaimStatus::*;

        match (event, self) {
            (ClaimData | Diagnoses | Procedures, Draft | DataEntered) => Some(DataEntered),
            (GroupIdrg, DataEntered) => Some(GroupedIdrg),
            (GroupInacbg, GroupedIdrg) => Some(GroupedInacbg),
            (Finalize, GroupedInacbg) => Some(Finalized),
            (Reedit, Finalized) => Some(DataEntered),
            (Submit, Finalized) => Some(Submitted),
            (ClaimData | Diagnoses | Procedures, GroupedIdrg | GroupedInacbg | Finalized | Submitted)
            | (GroupIdrg, Draft | GroupedIdrg | GroupedInacbg | Finalized | Submitted)
            | (GroupInacbg, Draft | DataEntered | GroupedInacbg | Finalized | Submitted)
            | (Finalize, Draft | DataEntered | GroupedIdrg | Finalized | Submitted)
            | (Reedit | Submit, Draft | DataEntered | GroupedIdrg | GroupedInacbg | Submitted) => None,
        }
    }

    /// Checks that `event` may be applied, without changing anything
    pub fn ensure(self, event: ClaimEvent) -> Result<ClaimStatus, ClaimError> {
        self.next(event).ok_or_else(|| ClaimError::InvalidState {
            required: event.required_states().to_string(),
            actual: self,
        })
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimStatus::Draft => "Draft",
            ClaimStatus::DataEntered => "DataEntered",
            ClaimStatus::GroupedIdrg => "GroupedIdrg",
            ClaimStatus::GroupedInacbg => "GroupedInacbg",
            ClaimStatus::Finalized => "Finalized",
            ClaimStatus::Submitted => "Submitted",
        };
        f.write_str(name)
    }
}

/// Successful lifecycle calls that move a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEvent {
    ClaimData,
    Diagnoses,
    Procedures,
    GroupIdrg,
    GroupInacbg,
    Finalize,
    Reedit,
    Submit,
}

impl ClaimEvent {
    /// Human-readable list of states the event is valid from
    pub fn required_states(&self) -> &'static str {
        match self {
            ClaimEvent::ClaimData | ClaimEvent::Diagnoses | ClaimEvent::Procedures => "Draft or DataEntered",
            ClaimEvent::GroupIdrg => "DataEntered",
            ClaimEvent::GroupInacbg => "GroupedIdrg",
            ClaimEvent::Finalize => "GroupedInacbg",
            ClaimEvent::Reedit | ClaimEvent::Submit => "Finalized",
        }
    }
}

/// Grouper stage requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrouperStage {
    /// Stage "1"
    Idrg,
    /// Stage "2"
    Inacbg,
}

impl GrouperStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrouperStage::Idrg => "1",
            GrouperStage::Inacbg => "2",
        }
    }

    pub fn event(&self) -> ClaimEvent {
        match self {
            GrouperStage::Idrg => ClaimEvent::GroupIdrg,
            GrouperStage::Inacbg => ClaimEvent::GroupInacbg,
        }
    }
}

impl FromStr for GrouperStage {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(GrouperStage::Idrg),
            "2" => Ok(GrouperStage::Inacbg),
            other => Err(ClaimError::InvalidStage(other.to_string())),
        }
    }
}

/// iDRG grouping result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdrgGrouping {
    pub code: String,
    pub description: String,
    pub tariff: Decimal,
}

impl IdrgGrouping {
    /// Reads the `idrg` object of a stage 1 grouper response
    pub fn from_response(response: &Value) -> Result<Self, ClaimError> {
        let idrg = response
            .get("idrg")
            .ok_or_else(|| ClaimError::InvalidResponse("grouper response has no idrg result".to_string()))?;

        Ok(Self {
            code: required_str(idrg, "code")?,
            description: optional_str(idrg, "description"),
            tariff: amount(idrg, "tariff")?,
        })
    }
}

/// INACBG special top-ups added to the base tariff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUps {
    pub special_procedure: Decimal,
    pub special_prosthesis: Decimal,
    pub special_investigation: Decimal,
    pub special_drug: Decimal,
    pub sub_acute: Decimal,
    pub chronic: Decimal,
    pub add_payment: Decimal,
}

impl TopUps {
    /// Sum of every top-up
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::InvalidResponse` if the sum overflows `Decimal`.
    pub fn sum(&self) -> Result<Decimal, ClaimError> {
        [
            self.special_procedure,
            self.special_prosthesis,
            self.special_investigation,
            self.special_drug,
            self.sub_acute,
            self.chronic,
            self.add_payment,
        ]
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| ClaimError::InvalidResponse("top-up amounts overflow".to_string()))
    }
}

/// INACBG grouping result with tariff breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InacbgGrouping {
    pub code: String,
    pub description: String,
    pub base_tariff: Decimal,
    pub top_ups: TopUps,
    /// Base tariff plus every top-up
    pub total_tariff: Decimal,
}

impl InacbgGrouping {
    /// Builds a grouping and computes its total
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::InvalidResponse` if the total overflows `Decimal`.
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        base_tariff: Decimal,
        top_ups: TopUps,
    ) -> Result<Self, ClaimError> {
        let total_tariff = base_tariff
            .checked_add(top_ups.sum()?)
            .ok_or_else(|| ClaimError::InvalidResponse("INACBG total tariff overflows".to_string()))?;
        Ok(Self {
            code: code.into(),
            description: description.into(),
            base_tariff,
            top_ups,
            total_tariff,
        })
    }

    /// Reads the `inacbg` object of a stage 2 grouper response
    ///
    /// Missing or null top-up amounts count as zero. The total is always
    /// recomputed locally.
    pub fn from_response(response: &Value) -> Result<Self, ClaimError> {
        let cbg = response
            .get("inacbg")
            .ok_or_else(|| ClaimError::InvalidResponse("grouper response has no inacbg result".to_string()))?;

        let top_ups = TopUps {
            special_procedure: amount(cbg, "special_procedure")?,
            special_prosthesis: amount(cbg, "special_prosthesis")?,
            special_investigation: amount(cbg, "special_investigation")?,
            special_drug: amount(cbg, "special_drug")?,
            sub_acute: amount(cbg, "sub_acute")?,
            chronic: amount(cbg, "chronic")?,
            add_payment: amount(cbg, "add_payment")?,
        };

        Self::new(
            required_str(cbg, "code")?,
            optional_str(cbg, "description"),
            amount(cbg, "base_tariff")?,
            top_ups,
        )
    }
}

/// Input for registering a new claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    /// Eligibility letter (SEP) number; at most one claim per letter
    pub eligibility_number: String,
    pub hospital_code: String,
    /// Patient snapshot sent with the registration
    pub patient: Value,
}

/// Local mirror of a remote claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    /// Number assigned by E-Klaim
    pub claim_number: String,
    pub eligibility_number: String,
    pub hospital_code: String,
    pub status: ClaimStatus,
    pub patient: Value,
    pub claim_data: Option<Value>,
    pub diagnoses: Option<Value>,
    pub procedures: Option<Value>,
    pub idrg: Option<IdrgGrouping>,
    pub inacbg: Option<InacbgGrouping>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Creates the mirror for a freshly registered claim
    pub fn draft(claim_number: impl Into<String>, new: NewClaim, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ClaimId::new(),
            claim_number: claim_number.into(),
            eligibility_number: new.eligibility_number,
            hospital_code: new.hospital_code,
            status: ClaimStatus::Draft,
            patient: new.patient,
            claim_data: None,
            diagnoses: None,
            procedures: None,
            idrg: None,
            inacbg: None,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
            submitted_at: None,
        }
    }

    /// Applies a lifecycle event
    ///
    /// The claim is left untouched if the event is not valid from the
    /// current status.
    pub fn advance(&mut self, event: ClaimEvent, actor: &str) -> Result<(), ClaimError> {
        let next = self.status.ensure(event)?;
        let now = Utc::now();

        match event {
            ClaimEvent::Finalize => self.finalized_at = Some(now),
            ClaimEvent::Submit => self.submitted_at = Some(now),
            ClaimEvent::Reedit => {
                self.idrg = None;
                self.inacbg = None;
                self.finalized_at = None;
            }
            ClaimEvent::ClaimData
            | ClaimEvent::Diagnoses
            | ClaimEvent::Procedures
            | ClaimEvent::GroupIdrg
            | ClaimEvent::GroupInacbg => {}
        }

        self.status = next;
        self.updated_by = actor.to_string();
        self.updated_at = now;
        Ok(())
    }

    /// Total INACBG tariff, once grouped
    pub fn total_tariff(&self) -> Option<Decimal> {
        self.inacbg.as_ref().map(|g| g.total_tariff)
    }
}

fn required_str(obj: &Value, field: &str) -> Result<String, ClaimError> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClaimError::InvalidResponse(format!("missing field '{}'", field)))
}

fn optional_str(obj: &Value, field: &str) -> String {
    obj.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Reads a monetary amount sent either as a JSON number or a string
fn amount(obj: &Value, field: &str) -> Result<Decimal, ClaimError> {
    let invalid = |raw: &str| ClaimError::InvalidResponse(format!("field '{}' is not an amount: {}", field, raw));

    match obj.get(field) {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).map_err(|_| invalid(s)),
        Some(Value::Number(n)) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map_err(|_| invalid(&raw))
        }
        Some(other) => Err(invalid(&other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        let obj = json!({"a": 1500000, "b": "250000.50", "c": null, "d": ""});
        assert_eq!(amount(&obj, "a").unwrap(), dec!(1500000));
        assert_eq!(amount(&obj, "b").unwrap(), dec!(250000.50));
        assert_eq!(amount(&obj, "c").unwrap(), Decimal::ZERO);
        assert_eq!(amount(&obj, "d").unwrap(), Decimal::ZERO);
        assert_eq!(amount(&obj, "missing").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_amount_rejects_garbage() {
        let obj = json!({"a": "lots", "b": [1]});
        assert!(matches!(amount(&obj, "a"), Err(ClaimError::InvalidResponse(_))));
        assert!(matches!(amount(&obj, "b"), Err(ClaimError::InvalidResponse(_))));
    }

    #[test]
    fn test_status_codes_round_trip() {
        for code in 1..=6 {
            assert_eq!(ClaimStatus::from_code(code).unwrap().code(), code);
        }
        assert_eq!(ClaimStatus::from_code(0), None);
        assert_eq!(ClaimStatus::from_code(7), None);
    }
}
