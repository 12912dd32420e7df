//! Credential handling using the secrecy crate
//!
//! API keys, client secrets, OAuth tokens and certificate PEMs are held as
//! [`SecretString`]. The wrapper zeroes memory on drop, redacts itself in
//! `Debug` output, and must be opened explicitly with `expose_secret()`.
//!
//! # Example
//!
//! ```rust
//! use medsync::config::{fingerprint, secret_string};
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("access-token-value".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "access-token-value");
//!
//! // Safe to log: a short digest, never the value
//! assert_eq!(fingerprint(&token).len(), 12);
//! assert!(!format!("{token:?}").contains("access-token-value"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Hex characters kept from the SHA-256 digest in a fingerprint
const FINGERPRINT_LEN: usize = 12;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty (or whitespace only)
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
pub type SecretString = Secret<SecretValue>;

/// Helper function to create a SecretString from a String
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Helper function to create an optional SecretString, treating blank
/// strings as absent
///
/// ```rust
/// use medsync::config::secret_string_opt;
///
/// assert!(secret_string_opt(Some("key".to_string())).is_some());
/// assert!(secret_string_opt(Some("  ".to_string())).is_none());
/// assert!(secret_string_opt(None).is_none());
/// ```
#[inline]
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(|s| Secret::new(SecretValue::from(s)))
}

/// Short, non-reversible identifier of a secret for logs
///
/// First twelve hex characters of the SHA-256 digest.
pub fn fingerprint(secret: &SecretString) -> String {
    let digest = Sha256::digest(secret.expose_secret().as_ref().as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("test-password".to_string());
        assert_eq!(secret.expose_secret().as_ref(), "test-password");
    }

    #[test]
    fn test_secret_string_opt_blank_is_none() {
        assert!(secret_string_opt(Some(String::new())).is_none());
        assert!(secret_string_opt(None).is_none());
        let secret = secret_string_opt(Some("k".to_string())).unwrap();
        assert!(!secret.expose_secret().is_blank());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-data".to_string());
        let debug_output = format!("{secret:?}");

        assert!(!debug_output.contains("sensitive-data"));
        assert!(debug_output.contains("REDACTED") || debug_output.contains("Secret"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint(&secret_string("token-a".to_string()));
        let b = fingerprint(&secret_string("token-a".to_string()));
        let c = fingerprint(&secret_string("token-b".to_string()));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
        assert!(!a.contains("token"));
    }

    #[test]
    fn test_secret_serde() {
        #[derive(Serialize, Deserialize)]
        struct Stored {
            api_key: SecretString,
        }

        let stored = Stored {
            api_key: secret_string("test123".to_string()),
        };

        let json = serde_json::to_string(&stored).unwrap();
        assert!(json.contains("test123"));

        let back: Stored = serde_json::from_str(&json).unwrap();
        assert_eq!(back.api_key.expose_secret().as_ref(), "test123");
    }
}
