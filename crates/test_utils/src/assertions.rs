//! Custom Test Assertions
//!
//! Assertion helpers for claims and audit trails that print the offending
//! entry instead of a bare `assertion failed`.

use domain_claims::{AuditLogEntry, Claim, ClaimStatus};

/// Asserts that a claim reached `expected`
pub fn assert_claim_status(claim: &Claim, expected: ClaimStatus) {
    assert_eq!(
        claim.status, expected,
        "Claim {} is {}, expected {}",
        claim.claim_number, claim.status, expected
    );
}

/// Asserts that an audit entry records a completed call
pub fn assert_audit_success(entry: &AuditLogEntry) {
    assert!(
        entry.is_success(),
        "Expected successful {} entry, got {:?}: {:?}",
        entry.action,
        entry.error_kind,
        entry.error_message
    );
    assert!(entry.request_plain.is_some(), "{} entry has no request snapshot", entry.action);
    assert!(entry.response_plain.is_some(), "{} entry has no response snapshot", entry.action);
}

/// Asserts that an audit entry records a failure of the given kind
pub fn assert_audit_failure(entry: &AuditLogEntry, kind: &str) {
    assert_eq!(
        entry.error_kind.as_deref(),
        Some(kind),
        "Expected {} entry to fail with {}, got {:?}",
        entry.action,
        kind,
        entry.error_kind
    );
    assert!(entry.error_message.is_some(), "{} failure has no message", entry.action);
}

/// Asserts that `entries` hold exactly one entry per action, in any order
pub fn assert_audit_actions(entries: &[AuditLogEntry], expected: &[&str]) {
    let mut actual: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    let mut wanted = expected.to_vec();
    actual.sort_unstable();
    wanted.sort_unstable();
    assert_eq!(actual, wanted, "Audit actions differ");
}
