//! Property-Based Test Generators
//!
//! Proptest strategies for claim inputs and wire values.

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use core_kernel::ClaimId;
use domain_claims::{ClaimEvent, ClaimStatus, TopUps};
use infra_eklaim::SecretKey;

/// Eligibility letter numbers in the `0301R0011026V000123` shape
pub fn eligibility_number_strategy() -> impl Strategy<Value = String> {
    "[0-9]{4}R[0-9]{3}[0-9]{4}V[0-9]{6}".prop_map(|s| s)
}

/// Seven-digit hospital codes
pub fn hospital_code_strategy() -> impl Strategy<Value = String> {
    "[0-9]{7}".prop_map(|s| s)
}

/// Random 256-bit provider keys
pub fn secret_key_strategy() -> impl Strategy<Value = SecretKey> {
    any::<[u8; 32]>().prop_map(SecretKey::from)
}

/// Hex rendering of a random key, in either case
pub fn hex_key_strategy() -> impl Strategy<Value = String> {
    (any::<[u8; 32]>(), any::<bool>()).prop_map(|(bytes, upper)| {
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        if upper {
            hex.to_uppercase()
        } else {
            hex
        }
    })
}

/// Rupiah amounts with up to two decimals
pub fn tariff_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

pub fn top_ups_strategy() -> impl Strategy<Value = TopUps> {
    proptest::collection::vec(tariff_strategy(), 7).prop_map(|v| TopUps {
        special_procedure: v[0],
        special_prosthesis: v[1],
        special_investigation: v[2],
        special_drug: v[3],
        sub_acute: v[4],
        chronic: v[5],
        add_payment: v[6],
    })
}

pub fn claim_status_strategy() -> impl Strategy<Value = ClaimStatus> {
    prop_oneof![
        Just(ClaimStatus::Draft),
        Just(ClaimStatus::DataEntered),
        Just(ClaimStatus::GroupedIdrg),
        Just(ClaimStatus::GroupedInacbg),
        Just(ClaimStatus::Finalized),
        Just(ClaimStatus::Submitted),
    ]
}

pub fn claim_event_strategy() -> impl Strategy<Value = ClaimEvent> {
    prop_oneof![
        Just(ClaimEvent::ClaimData),
        Just(ClaimEvent::Diagnoses),
        Just(ClaimEvent::Procedures),
        Just(ClaimEvent::GroupIdrg),
        Just(ClaimEvent::GroupInacbg),
        Just(ClaimEvent::Finalize),
        Just(ClaimEvent::Reedit),
        Just(ClaimEvent::Submit),
    ]
}

/// Strategy for generating ClaimId
pub fn claim_id_strategy() -> impl Strategy<Value = ClaimId> {
    any::<[u8; 16]>().prop_map(|bytes| ClaimId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Flat JSON objects of strings and integers, like claim data payloads
pub fn payload_strategy() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map(
        "[a-z_]{1,12}",
        prop_oneof![
            "[ -~]{0,24}".prop_map(Value::String),
            any::<i32>().prop_map(|n| json!(n)),
        ],
        1..8,
    )
    .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn hex_keys_always_parse(hex in hex_key_strategy()) {
            prop_assert!(SecretKey::parse(&hex).is_ok());
        }

        #[test]
        fn eligibility_numbers_have_expected_length(sep in eligibility_number_strategy()) {
            prop_assert_eq!(sep.len(), 19);
        }

        #[test]
        fn top_ups_sum_is_non_negative(top_ups in top_ups_strategy()) {
            prop_assert!(top_ups.sum().unwrap() >= Decimal::ZERO);
        }

        #[test]
        fn payloads_are_non_empty_objects(payload in payload_strategy()) {
            prop_assert!(payload.as_object().is_some_and(|o| !o.is_empty()));
        }
    }
}
