//! Keyed and keyless digests used for pseudonymisation and audit
//!
//! - [`SecretKey`] holds the tokenisation key and refuses degenerate values
//! - [`keyed_digest`] is the HMAC-SHA-256 digest behind pseudonym tokens
//! - [`value_hash`] is a keyless SHA-256 digest kept for audit trails

use crate::error::{GateError, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Hex characters kept from the keyless value hash.
pub const VALUE_HASH_LEN: usize = 8;

/// Placeholder values that ship in sample configs and must never be used.
const PLACEHOLDER_KEYS: &[&str] = &["change-me-32chars-minimum", "changeme", "secret"];

/// Tokenisation secret
///
/// Zeroized on drop. `Debug` never prints the key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Validate and wrap raw key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let mut bytes = bytes.into();
        if let Err(e) = validate_key(&bytes) {
            bytes.zeroize();
            return Err(e);
        }
        Ok(Self(bytes))
    }

    /// Read the key from an environment variable.
    ///
    /// A missing variable is a configuration error; there is no fallback.
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var(var).map_err(|_| {
            GateError::Config(format!("Tokenisation key variable '{}' is not set", var))
        })?;
        Self::new(value.into_bytes())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {} bytes])", self.0.len())
    }
}

fn validate_key(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_KEY_LEN {
        return Err(GateError::Config(format!(
            "Tokenisation key must be at least {} bytes, got {}",
            MIN_KEY_LEN,
            bytes.len()
        )));
    }
    if bytes.iter().all(|b| *b == bytes[0]) {
        return Err(GateError::Config(
            "Tokenisation key is a single repeated byte".to_string(),
        ));
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        let lower = text.trim().to_ascii_lowercase();
        if PLACEHOLDER_KEYS.iter().any(|p| lower.starts_with(p)) {
            return Err(GateError::Config(
                "Tokenisation key is a known placeholder value".to_string(),
            ));
        }
    }
    Ok(())
}

/// Uppercase hex HMAC-SHA-256 of `value`, truncated to `width` characters.
pub fn keyed_digest(key: &SecretKey, value: &str, width: usize) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.expose())
        .map_err(|e| GateError::Config(format!("Invalid HMAC key: {}", e)))?;
    mac.update(value.as_bytes());
    let mut digest = hex::encode_upper(mac.finalize().into_bytes());
    digest.truncate(width);
    Ok(digest)
}

/// Keyless SHA-256 digest of a raw value, lowercase hex, truncated.
///
/// Independent of the tokenisation key; used only to correlate audit
/// records without retaining the raw text.
pub fn value_hash(value: &str) -> String {
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    digest[..VALUE_HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "kpg-test-key-0123456789-abcdefghij";

    #[test]
    fn test_rejects_short_key() {
        let err = SecretKey::new("too-short").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_key() {
        assert!(SecretKey::new(Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_repeated_byte_key() {
        assert!(SecretKey::new(vec![b'a'; 64]).is_err());
    }

    #[test]
    fn test_rejects_placeholder_key() {
        let err = SecretKey::new("change-me-32chars-minimum-padding-padding").unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_from_env_missing_is_error() {
        let err = SecretKey::from_env("A3S_PII_GATE_TEST_UNSET_KEY_VAR").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = SecretKey::new(KEY).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("kpg-test"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_keyed_digest_is_deterministic_and_keyed() {
        let a = SecretKey::new(KEY).unwrap();
        let b = SecretKey::new("another-key-9876543210-zyxwvutsrqpo").unwrap();

        let d1 = keyed_digest(&a, "John Tan", 4).unwrap();
        let d2 = keyed_digest(&a, "John Tan", 4).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 4);
        assert!(d1.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        // Different keys give a different full digest
        assert_ne!(
            keyed_digest(&a, "John Tan", 64).unwrap(),
            keyed_digest(&b, "John Tan", 64).unwrap()
        );
    }

    #[test]
    fn test_value_hash_is_keyless_and_short() {
        let h = value_hash("S1234567D");
        assert_eq!(h.len(), VALUE_HASH_LEN);
        assert_eq!(h, value_hash("S1234567D"));
        assert_ne!(h, value_hash("S1234567E"));
        // sha256("abc") = ba7816bf...
        assert_eq!(value_hash("abc"), "ba7816bf");
    }
}
