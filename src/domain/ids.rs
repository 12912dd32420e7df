//! Domain identifier types with validation
//!
//! Newtype wrappers keep integration ids and log ids from being mixed up
//! with each other or with provider record ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Integration identifier newtype wrapper
///
/// Integration ids are chosen by whoever configures the integration and must
/// be short, URL-safe slugs because they appear in log filters and CLI
/// arguments.
///
/// # Examples
///
/// ```
/// use medsync::domain::ids::IntegrationId;
/// use std::str::FromStr;
///
/// let id = IntegrationId::from_str("sonic-pathology").unwrap();
/// assert_eq!(id.as_str(), "sonic-pathology");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntegrationId(String);

impl IntegrationId {
    /// Creates a new IntegrationId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(IntegrationId)` if the ID is a non-empty slug of ASCII
    /// alphanumerics, `-` and `_`, at most 64 characters long.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Integration ID cannot be empty".to_string());
        }
        if id.len() > 64 {
            return Err(format!(
                "Integration ID must be at most 64 characters, got {}",
                id.len()
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!(
                "Invalid integration ID '{id}'. Only ASCII letters, digits, '-' and '_' are allowed"
            ));
        }
        Ok(Self(id))
    }

    /// Returns the integration ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntegrationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for IntegrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sync log entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId(Uuid);

impl LogId {
    /// Generates a fresh random log id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid log id '{s}': {e}"))
    }
}
