//! Quota key validation.

use crate::error::{QuotaGateError, Result};

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 512;

/// A validated key that partitions independent counters.
///
/// The gate treats the key as opaque. It only rejects values that cannot be
/// a sensible store key: empty strings, whitespace, control characters and
/// anything longer than [`MAX_KEY_LEN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey(String);

impl QuotaKey {
    /// Validate a caller-supplied key.
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(QuotaGateError::InvalidKey("key must not be empty".into()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(QuotaGateError::InvalidKey(format!(
                "key is {} bytes, limit is {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        if let Some(c) = key.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(QuotaGateError::InvalidKey(format!(
                "key contains forbidden character {:?}",
                c
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for QuotaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QuotaKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        for key in ["EXAMPLE::TIME", "EXAMPLE::UTC", "a", "user:42|op=read"] {
            let parsed = QuotaKey::parse(key).unwrap();
            assert_eq!(parsed.as_str(), key);
            assert_eq!(parsed.to_string(), key);
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = QuotaKey::parse("").unwrap_err();
        assert_eq!(err.kind(), "invalid_key");
    }

    #[test]
    fn test_whitespace_and_control_rejected() {
        assert!(QuotaKey::parse("has space").is_err());
        assert!(QuotaKey::parse("tab\there").is_err());
        assert!(QuotaKey::parse("nul\0").is_err());
        assert!(QuotaKey::parse(" ").is_err());
    }

    #[test]
    fn test_length_limit() {
        assert!(QuotaKey::parse(&"k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(QuotaKey::parse(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }
}
