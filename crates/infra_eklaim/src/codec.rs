//! Envelope encryption codec
//!
//! Bodies exchanged with E-Klaim are framed as
//!
//! ```text
//! Base64( HMAC10 || IV || CIPHERTEXT )
//!   HMAC10     = HMAC-SHA256(CIPHERTEXT, key)[0..10]
//!   IV         = 16 random bytes
//!   CIPHERTEXT = AES-256-CBC-PKCS7(plaintext, key, IV)
//! ```
//!
//! The MAC covers the ciphertext only, not the IV, and is truncated to ten
//! bytes. Both are part of the remote contract and must not change without
//! the service owner agreeing to a new framing.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::EklaimError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;
/// CBC initialisation vector length in bytes
pub const IV_LEN: usize = 16;
/// Truncated HMAC length in bytes
pub const MAC_LEN: usize = 10;
/// Smallest decoded envelope: MAC plus IV, no ciphertext
pub const HEADER_LEN: usize = MAC_LEN + IV_LEN;

const ARMOR_BEGIN: &str = "----BEGIN ENCRYPTED DATA----";
const ARMOR_END: &str = "----END ENCRYPTED DATA----";

/// A validated 256-bit E-Klaim secret key
///
/// Parsed once from the hex string held in the provider configuration. The
/// bytes are wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Parses a 64-character hex key
    ///
    /// Whitespace and the separators `:`, `-` and `_` are ignored so keys
    /// pasted from the provider portal in grouped form are accepted.
    ///
    /// # Errors
    ///
    /// Returns `EklaimError::KeyConfig` if the cleaned string is not exactly
    /// 64 hex characters.
    pub fn parse(hex_key: &str) -> Result<Self, EklaimError> {
        let cleaned: Zeroizing<String> = Zeroizing::new(
            hex_key
                .chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, ':' | '-' | '_'))
                .collect(),
        );

        let found = cleaned.chars().count();
        if found != KEY_LEN * 2 {
            return Err(EklaimError::KeyConfig(format!(
                "expected {} hex characters, found {}",
                KEY_LEN * 2,
                found
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(cleaned.as_bytes(), &mut bytes)
            .map_err(|e| EklaimError::KeyConfig(format!("not a hex string: {}", e)))?;

        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl From<[u8; KEY_LEN]> for SecretKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(**redacted**)")
    }
}

/// Encrypts a plaintext payload into the wire envelope
///
/// # Errors
///
/// Returns `EklaimError::Encryption` if the key is not 32 bytes or the
/// plaintext is empty.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String, EklaimError> {
    if key.len() != KEY_LEN {
        return Err(EklaimError::Encryption(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }
    if plaintext.is_empty() {
        return Err(EklaimError::Encryption("plaintext is empty".to_string()));
    }

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| EklaimError::Encryption(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = signer(key)?.chain_update(&ciphertext).finalize().into_bytes();

    let mut wire = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    wire.extend_from_slice(&tag[..MAC_LEN]);
    wire.extend_from_slice(&iv);
    wire.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(wire))
}

/// Decrypts a wire envelope back into the plaintext payload
///
/// The MAC is verified in constant time before any decryption is attempted.
/// Armour lines around the Base64 body are tolerated.
///
/// # Errors
///
/// - `Format` if the body is not Base64 or is shorter than 26 bytes
/// - `Integrity` if the truncated MAC does not match
/// - `Padding` if PKCS7 unpadding fails
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<Vec<u8>, EklaimError> {
    if key.len() != KEY_LEN {
        return Err(EklaimError::Encryption(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }

    let raw = STANDARD
        .decode(strip_armor(encoded))
        .map_err(|e| EklaimError::Format(format!("invalid base64: {}", e)))?;

    if raw.len() < HEADER_LEN {
        return Err(EklaimError::Format(format!(
            "envelope is {} bytes, need at least {}",
            raw.len(),
            HEADER_LEN
        )));
    }

    let (tag, rest) = raw.split_at(MAC_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    signer(key)?
        .chain_update(ciphertext)
        .verify_truncated_left(tag)
        .map_err(|_| EklaimError::Integrity)?;

    Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| EklaimError::Encryption(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EklaimError::Padding)
}

/// Removes optional armour lines and all whitespace from a response body
pub fn strip_armor(body: &str) -> String {
    let trimmed = body.trim();
    let inner = match (trimmed.find(ARMOR_BEGIN), trimmed.rfind(ARMOR_END)) {
        (Some(start), Some(end)) if start + ARMOR_BEGIN.len() <= end => {
            &trimmed[start + ARMOR_BEGIN.len()..end]
        }
        _ => trimmed,
    };
    inner.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn signer(key: &[u8]) -> Result<HmacSha256, EklaimError> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| EklaimError::Encryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::block_padding::NoPadding;

    const KEY_HEX: &str = "891b3a5e8f3c0d4a7e6b2c1f9d8e7a6b5c4d3e2f1a0b9c8d7e6f5a4b3c2d1e0f";

    fn key() -> SecretKey {
        SecretKey::parse(KEY_HEX).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let key = key();
        let encoded = encrypt(br#"{"metadata":{"method":"new_claim"}}"#, key.as_bytes()).unwrap();
        let decoded = decrypt(&encoded, key.as_bytes()).unwrap();
        assert_eq!(decoded, br#"{"metadata":{"method":"new_claim"}}"#);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = key();
        let a = encrypt(b"same payload", key.as_bytes()).unwrap();
        let b = encrypt(b"same payload", key.as_bytes()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_layout_lengths() {
        let key = key();
        let raw = STANDARD.decode(encrypt(b"0123456789abcdef", key.as_bytes()).unwrap()).unwrap();
        // a full block of input gains a full block of padding
        assert_eq!(raw.len(), HEADER_LEN + 32);
    }

    #[test]
    fn test_encrypt_rejects_empty_plaintext() {
        assert!(matches!(encrypt(b"", key().as_bytes()), Err(EklaimError::Encryption(_))));
    }

    #[test]
    fn test_encrypt_rejects_short_key() {
        assert!(matches!(encrypt(b"data", &[0u8; 16]), Err(EklaimError::Encryption(_))));
    }

    #[test]
    fn test_decrypt_rejects_short_envelope() {
        let short = STANDARD.encode([0u8; HEADER_LEN - 1]);
        assert!(matches!(decrypt(&short, key().as_bytes()), Err(EklaimError::Format(_))));
    }

    #[test]
    fn test_decrypt_rejects_non_base64() {
        assert!(matches!(decrypt("not base64!!", key().as_bytes()), Err(EklaimError::Format(_))));
    }

    #[test]
    fn test_wrong_key_is_integrity_error() {
        let encoded = encrypt(b"payload", key().as_bytes()).unwrap();
        let other = SecretKey::from([7u8; KEY_LEN]);
        assert!(matches!(decrypt(&encoded, other.as_bytes()), Err(EklaimError::Integrity)));
    }

    #[test]
    fn test_valid_mac_over_bad_padding_is_padding_error() {
        let key = key();
        let iv = [1u8; IV_LEN];
        // a single block of zeros that was never padded
        let ciphertext = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(&[0u8; 16]);
        let tag = signer(key.as_bytes()).unwrap().chain_update(&ciphertext).finalize().into_bytes();
        let mut wire = tag[..MAC_LEN].to_vec();
        wire.extend_from_slice(&iv);
        wire.extend_from_slice(&ciphertext);

        let result = decrypt(&STANDARD.encode(wire), key.as_bytes());
        assert!(matches!(result, Err(EklaimError::Padding)));
    }

    #[test]
    fn test_armored_body_is_accepted() {
        let key = key();
        let encoded = encrypt(b"armored", key.as_bytes()).unwrap();
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let armored = format!("{}\n{}\n{}\n{}\n", ARMOR_BEGIN, head, tail, ARMOR_END);
        assert_eq!(decrypt(&armored, key.as_bytes()).unwrap(), b"armored");
    }

    #[test]
    fn test_parse_key_accepts_separators() {
        let grouped = KEY_HEX
            .as_bytes()
            .chunks(8)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("-");
        assert_eq!(SecretKey::parse(&grouped).unwrap(), key());
        assert_eq!(SecretKey::parse(&format!("  {}\n", KEY_HEX.to_uppercase())).unwrap(), key());
    }

    #[test]
    fn test_parse_key_rejects_bad_input() {
        assert!(matches!(SecretKey::parse(&KEY_HEX[..62]), Err(EklaimError::KeyConfig(_))));
        assert!(matches!(SecretKey::parse(&format!("{}00", KEY_HEX)), Err(EklaimError::KeyConfig(_))));
        let non_hex = format!("zz{}", &KEY_HEX[2..]);
        assert!(matches!(SecretKey::parse(&non_hex), Err(EklaimError::KeyConfig(_))));
        assert!(matches!(SecretKey::parse(""), Err(EklaimError::KeyConfig(_))));
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        assert_eq!(format!("{:?}", key()), "SecretKey(**redacted**)");
    }
}
