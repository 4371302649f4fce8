//! Property tests for the envelope codec and the throttle

use base64::{engine::general_purpose::STANDARD, Engine as _};
use infra_eklaim::codec::{self, HEADER_LEN, KEY_LEN, MAC_LEN};
use infra_eklaim::{EklaimError, RateLimiterRegistry, SecretKey};
use proptest::prelude::*;
use std::time::Duration;

fn key_strategy() -> impl Strategy<Value = [u8; KEY_LEN]> {
    prop::array::uniform32(any::<u8>())
}

proptest! {
    #[test]
    fn round_trip_recovers_plaintext(
        key in key_strategy(),
        plaintext in prop::collection::vec(any::<u8>(), 1..2048),
    ) {
        let encoded = codec::encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(codec::decrypt(&encoded, &key).unwrap(), plaintext);
    }

    #[test]
    fn ciphertext_is_block_aligned(
        key in key_strategy(),
        plaintext in prop::collection::vec(any::<u8>(), 1..512),
    ) {
        let raw = STANDARD.decode(codec::encrypt(&plaintext, &key).unwrap()).unwrap();
        let body = raw.len() - HEADER_LEN;
        prop_assert_eq!(body % 16, 0);
        prop_assert!(body > plaintext.len());
    }

    #[test]
    fn flipping_any_mac_or_ciphertext_byte_is_detected(
        key in key_strategy(),
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut raw = STANDARD.decode(codec::encrypt(&plaintext, &key).unwrap()).unwrap();
        // the IV is not covered by the MAC
        let candidates: Vec<usize> = (0..MAC_LEN).chain(HEADER_LEN..raw.len()).collect();
        let target = candidates[position.index(candidates.len())];
        raw[target] ^= flip;

        let result = codec::decrypt(&STANDARD.encode(raw), &key);
        prop_assert!(matches!(result, Err(EklaimError::Integrity)));
    }

    #[test]
    fn keys_of_wrong_length_are_rejected(len in (0usize..80).prop_filter("not 64", |l| *l != 64)) {
        let hex_key = "a".repeat(len);
        prop_assert!(matches!(SecretKey::parse(&hex_key), Err(EklaimError::KeyConfig(_))));
    }

    #[test]
    fn hex_key_parses_regardless_of_case(key in key_strategy()) {
        let lower = hex::encode(key);
        let upper = lower.to_uppercase();
        prop_assert_eq!(SecretKey::parse(&lower).unwrap(), SecretKey::from(key));
        prop_assert_eq!(SecretKey::parse(&upper).unwrap(), SecretKey::from(key));
    }

    #[test]
    fn limiter_admits_exactly_limit_calls_per_window(limit in 0u32..50, extra in 1u32..20) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let limiter = RateLimiterRegistry::new();
            let start = tokio::time::Instant::now();

            let mut admitted = 0;
            for i in 0..(limit + extra) {
                let at = start + Duration::from_millis(u64::from(i));
                if limiter.allow_at("HOSP", limit, at).await {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, limit);
            assert_eq!(
                limiter.allow_at("HOSP", limit, start + Duration::from_secs(60)).await,
                limit > 0
            );
        });
    }
}
