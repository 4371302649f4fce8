//! Plaintext request and response envelopes
//!
//! Request: `{"metadata": {"method": <action>, ...}, "data": {...}}`
//!
//! Response: `{"metadata": {"code", "message", "error_no"}, "response": {...}}`

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::EklaimError;

/// Metadata code of a successful call
pub const SUCCESS_CODE: u16 = 200;

/// `error_no` values that mean the credentials were rejected
pub const AUTH_ERROR_CODES: &[&str] = &["E2001", "E2002", "E2003", "E2004"];

/// Remote actions exposed by E-Klaim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EklaimAction {
    NewClaim,
    SetClaimData,
    #[serde(rename = "idrg_diagnosa_set")]
    IdrgDiagnosaSet,
    #[serde(rename = "idrg_procedure_set")]
    IdrgProcedureSet,
    Grouper,
    ClaimFinal,
    ReeditClaim,
    SendClaimIndividual,
}

impl EklaimAction {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            EklaimAction::NewClaim => "new_claim",
            EklaimAction::SetClaimData => "set_claim_data",
            EklaimAction::IdrgDiagnosaSet => "idrg_diagnosa_set",
            EklaimAction::IdrgProcedureSet => "idrg_procedure_set",
            EklaimAction::Grouper => "grouper",
            EklaimAction::ClaimFinal => "claim_final",
            EklaimAction::ReeditClaim => "reedit_claim",
            EklaimAction::SendClaimIndividual => "send_claim_individual",
        }
    }

    /// HTTP method used on the wire; every action is a POST
    pub fn http_method(&self) -> &'static str {
        "POST"
    }
}

impl fmt::Display for EklaimAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub method: EklaimAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// Plaintext request body before encryption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub metadata: RequestMetadata,
    #[serde(default)]
    pub data: Value,
}

impl RequestEnvelope {
    pub fn new(action: EklaimAction, data: Value) -> Self {
        Self {
            metadata: RequestMetadata {
                method: action,
                claim_number: None,
                stage: None,
            },
            data,
        }
    }

    /// Targets an existing remote claim
    pub fn for_claim(mut self, claim_number: impl Into<String>) -> Self {
        self.metadata.claim_number = Some(claim_number.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.metadata.stage = Some(stage.into());
        self
    }

    pub fn action(&self) -> EklaimAction {
        self.metadata.method
    }

    /// Serializes the envelope to the JSON sent through the codec
    pub fn to_json(&self) -> Result<String, EklaimError> {
        serde_json::to_string(self).map_err(|e| EklaimError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(deserialize_with = "code_from_number_or_string")]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_no: Option<String>,
}

/// Decrypted response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub metadata: ResponseMetadata,
    #[serde(default)]
    pub response: Value,
}

impl ResponseEnvelope {
    /// Builds a success envelope
    pub fn ok(response: Value) -> Self {
        Self {
            metadata: ResponseMetadata {
                code: SUCCESS_CODE,
                message: "Ok".to_string(),
                error_no: None,
            },
            response,
        }
    }

    /// Builds an error envelope
    pub fn error(code: u16, error_no: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metadata: ResponseMetadata {
                code,
                message: message.into(),
                error_no: Some(error_no.into()),
            },
            response: Value::Null,
        }
    }

    /// Parses decrypted JSON
    pub fn parse(json: &str) -> Result<Self, EklaimError> {
        serde_json::from_str(json)
            .map_err(|e| EklaimError::Format(format!("response envelope is not valid JSON: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        self.metadata.code == SUCCESS_CODE
    }

    /// Looks up a field of the `response` object
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.response.get(name)
    }

    /// Converts an embedded error into the matching `EklaimError`
    ///
    /// Metadata code 401/403 or an `error_no` in [`AUTH_ERROR_CODES`] is an
    /// authentication failure. Everything else that is not 200 is a
    /// protocol error.
    pub fn into_result(self) -> Result<Self, EklaimError> {
        if self.is_success() {
            return Ok(self);
        }

        let ResponseMetadata { code, message, error_no } = self.metadata;
        let auth_code = error_no
            .as_deref()
            .map(|no| AUTH_ERROR_CODES.contains(&no))
            .unwrap_or(false);

        if matches!(code, 401 | 403) || auth_code {
            Err(EklaimError::Authentication {
                status: None,
                code: error_no,
                message,
            })
        } else {
            Err(EklaimError::Protocol {
                code: error_no.unwrap_or_else(|| code.to_string()),
                message,
            })
        }
    }
}

fn code_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Number(u16),
        Text(String),
    }

    match Code::deserialize(deserializer)? {
        Code::Number(n) => Ok(n),
        Code::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let envelope = RequestEnvelope::new(EklaimAction::Grouper, json!({}))
            .for_claim("CLM-0001")
            .with_stage("1");
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["metadata"]["method"], "grouper");
        assert_eq!(value["metadata"]["stage"], "1");
        assert_eq!(value["metadata"]["claim_number"], "CLM-0001");
    }

    #[test]
    fn test_optional_metadata_is_omitted() {
        let json = RequestEnvelope::new(EklaimAction::NewClaim, json!({"a": 1})).to_json().unwrap();
        assert!(!json.contains("stage"));
        assert!(!json.contains("claim_number"));
        assert!(json.contains("\"new_claim\""));
    }

    #[test]
    fn test_action_wire_names_match_serde() {
        for action in [
            EklaimAction::NewClaim,
            EklaimAction::SetClaimData,
            EklaimAction::IdrgDiagnosaSet,
            EklaimAction::IdrgProcedureSet,
            EklaimAction::Grouper,
            EklaimAction::ClaimFinal,
            EklaimAction::ReeditClaim,
            EklaimAction::SendClaimIndividual,
        ] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }

    #[test]
    fn test_code_accepts_string() {
        let envelope = ResponseEnvelope::parse(r#"{"metadata":{"code":"200","message":"Ok"}}"#).unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.response, Value::Null);
    }

    #[test]
    fn test_auth_error_no_classified() {
        let result = ResponseEnvelope::error(400, "E2003", "invalid consumer").into_result();
        assert!(matches!(result, Err(EklaimError::Authentication { code: Some(c), .. }) if c == "E2003"));
    }

    #[test]
    fn test_auth_metadata_code_classified() {
        let envelope = ResponseEnvelope {
            metadata: ResponseMetadata { code: 401, message: "unauthorized".into(), error_no: None },
            response: Value::Null,
        };
        assert!(matches!(envelope.into_result(), Err(EklaimError::Authentication { .. })));
    }

    #[test]
    fn test_other_errors_are_protocol() {
        let result = ResponseEnvelope::error(400, "E2101", "claim already final").into_result();
        match result {
            Err(EklaimError::Protocol { code, message }) => {
                assert_eq!(code, "E2101");
                assert_eq!(message, "claim already final");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }
}
