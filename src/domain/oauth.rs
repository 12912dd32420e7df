//! OAuth handshake state

use super::ids::IntegrationId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anti-forgery token for one in-flight authorization attempt
///
/// Created when an authorization URL is generated and consumed exactly once
/// by a matching callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthState {
    pub integration_id: IntegrationId,
    pub state: String,
    pub created_at: DateTime<Utc>,
    /// Redirect URI sent with the authorization request; the token exchange
    /// must repeat it verbatim
    pub redirect_uri: String,
}

impl OAuthState {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// Per-integration authorization phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OAuthPhase {
    #[default]
    Idle,
    Authorizing,
    AwaitingCallback,
    Exchanging,
    Connected,
    Failed,
}

impl fmt::Display for OAuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OAuthPhase::Idle => "idle",
            OAuthPhase::Authorizing => "authorizing",
            OAuthPhase::AwaitingCallback => "awaiting-callback",
            OAuthPhase::Exchanging => "exchanging",
            OAuthPhase::Connected => "connected",
            OAuthPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}
