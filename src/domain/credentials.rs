//! Integration credentials
//!
//! Credentials are a closed tagged union: one variant per supported auth
//! method. The variant is the auth method, so an integration can never carry
//! credentials of a different shape than the method it authenticates with.

use crate::config::SecretString;
use crate::domain::errors::AuthError;
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    /// OAuth2 authorization-code flow
    #[serde(rename = "oauth")]
    OAuth,
    /// Static bearer API key
    ApiKey,
    /// Client certificate (mTLS)
    Certificate,
}

impl AuthMethod {
    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::OAuth => "oauth",
            AuthMethod::ApiKey => "api-key",
            AuthMethod::Certificate => "certificate",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth" => Ok(AuthMethod::OAuth),
            "api-key" => Ok(AuthMethod::ApiKey),
            "certificate" => Ok(AuthMethod::Certificate),
            other => Err(AuthError::UnsupportedAuthMethod(format!(
                "'{other}'. Must be one of: oauth, api-key, certificate"
            ))),
        }
    }
}

/// OAuth2 client registration plus the current token set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    /// Client id registered with the provider
    pub client_id: String,

    /// Client secret registered with the provider
    #[serde(default)]
    pub client_secret: Option<SecretString>,

    /// Provider authorization endpoint
    pub authorization_url: String,

    /// Provider token endpoint
    pub token_url: String,

    /// Requested scope
    #[serde(default)]
    pub scope: Option<String>,

    /// Redirect URI registered for this integration
    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub access_token: Option<SecretString>,

    #[serde(default)]
    pub refresh_token: Option<SecretString>,

    /// Access token expiry, set at token-exchange time
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthCredentials {
    /// Whether the access token is expired, or will be within `skew`
    ///
    /// A token without a recorded expiry is treated as valid.
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + skew,
            None => false,
        }
    }

    /// Applies a freshly exchanged token set
    ///
    /// A provider that does not rotate refresh tokens omits one from the
    /// response; the previously stored refresh token is kept in that case.
    pub fn apply_tokens(&mut self, tokens: OAuthTokens) {
        self.access_token = Some(tokens.access_token);
        if let Some(refresh) = tokens.refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.expires_at = tokens.expires_at;
    }
}

/// Token set returned by the provider token endpoint
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-integration credential set
///
/// Serialized only into the persistence collaborator. Client-visible views
/// such as [`IntegrationSummary`](crate::domain::IntegrationSummary) never
/// include it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Credentials {
    #[serde(rename = "api-key")]
    ApiKey {
        #[serde(default)]
        api_key: Option<SecretString>,
    },

    #[serde(rename = "oauth")]
    OAuth(OAuthCredentials),

    /// PEM blob holding the client certificate chain and private key
    #[serde(rename = "certificate")]
    Certificate {
        #[serde(default)]
        pem: Option<SecretString>,
    },
}

impl Credentials {
    /// The auth method these credentials belong to
    pub fn method(&self) -> AuthMethod {
        match self {
            Credentials::ApiKey { .. } => AuthMethod::ApiKey,
            Credentials::OAuth(_) => AuthMethod::OAuth,
            Credentials::Certificate { .. } => AuthMethod::Certificate,
        }
    }

    /// Whether the secret needed to authenticate is present and non-empty
    pub fn is_complete(&self) -> bool {
        fn present(secret: &Option<SecretString>) -> bool {
            secret
                .as_ref()
                .map(|s| !s.expose_secret().is_blank())
                .unwrap_or(false)
        }

        match self {
            Credentials::ApiKey { api_key } => present(api_key),
            Credentials::OAuth(oauth) => present(&oauth.access_token),
            Credentials::Certificate { pem } => present(pem),
        }
    }
}
