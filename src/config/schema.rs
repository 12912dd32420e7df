//! Configuration schema types
//!
//! This module defines the configuration structure for MedSync.

use crate::config::{secret_string_opt, SecretString};
use crate::domain::{
    AuthMethod, Credentials, IntegrationConfig, IntegrationId, IntegrationType, MedSyncError,
    OAuthCredentials,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main MedSync configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MedSyncConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Outbound HTTP settings shared by all provider clients
    #[serde(default)]
    pub http: HttpConfig,

    /// Sync execution settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// OAuth handshake settings
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Integration and sync log storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Integration definitions importable into the store
    #[serde(default)]
    pub integrations: Vec<IntegrationDefinition>,
}

impl MedSyncConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.http.validate(&self.environment)?;
        self.sync.validate()?;
        self.oauth.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;

        let mut seen = HashSet::new();
        for definition in &self.integrations {
            if !seen.insert(definition.id.as_str()) {
                return Err(format!("duplicate integration id '{}'", definition.id));
            }
            definition
                .to_integration(&self.oauth)
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TCP/TLS connect timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            user_agent: default_user_agent(),
            tls_verify: true,
        }
    }
}

impl HttpConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        if self.timeout_seconds == 0 {
            return Err("http.timeout_seconds must be > 0".to_string());
        }
        if self.connect_timeout_seconds == 0 {
            return Err("http.connect_timeout_seconds must be > 0".to_string());
        }
        if !self.tls_verify && *environment == Environment::Production {
            return Err(
                "http.tls_verify cannot be disabled when environment = 'production'".to_string(),
            );
        }
        Ok(())
    }
}

/// Retry backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Sync execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound for persisting a single record
    #[serde(default = "default_record_timeout_seconds")]
    pub record_timeout_seconds: u64,

    /// Backoff between retries of transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Grace period for in-flight syncs on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            record_timeout_seconds: default_record_timeout_seconds(),
            retry: RetryConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<(), String> {
        if self.record_timeout_seconds == 0 {
            return Err("sync.record_timeout_seconds must be > 0".to_string());
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(format!(
                "sync.retry.backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err("sync.retry.initial_delay_ms must be <= max_delay_ms".to_string());
        }
        Ok(())
    }
}

/// OAuth handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Lifetime of a pending authorization state
    #[serde(default = "default_state_ttl_seconds")]
    pub state_ttl_seconds: u64,

    /// Access tokens expiring within this window are refreshed before use
    #[serde(default = "default_token_expiry_skew_seconds")]
    pub token_expiry_skew_seconds: u64,

    /// Scope requested when an integration does not set its own
    #[serde(default = "default_scope")]
    pub default_scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: default_state_ttl_seconds(),
            token_expiry_skew_seconds: default_token_expiry_skew_seconds(),
            default_scope: default_scope(),
        }
    }
}

/// Upper bound for both OAuth windows
const MAX_OAUTH_WINDOW_SECONDS: u64 = 86_400;

impl OAuthConfig {
    fn validate(&self) -> Result<(), String> {
        if self.state_ttl_seconds == 0 || self.state_ttl_seconds > MAX_OAUTH_WINDOW_SECONDS {
            return Err(format!(
                "oauth.state_ttl_seconds must be between 1 and {MAX_OAUTH_WINDOW_SECONDS}, got {}",
                self.state_ttl_seconds
            ));
        }
        if self.token_expiry_skew_seconds > MAX_OAUTH_WINDOW_SECONDS {
            return Err(format!(
                "oauth.token_expiry_skew_seconds must be <= {MAX_OAUTH_WINDOW_SECONDS}, got {}",
                self.token_expiry_skew_seconds
            ));
        }
        Ok(())
    }

    /// Lifetime of a pending authorization state
    pub fn state_ttl(&self) -> chrono::Duration {
        window(self.state_ttl_seconds)
    }

    /// Refresh window before access token expiry
    pub fn token_expiry_skew(&self) -> chrono::Duration {
        window(self.token_expiry_skew_seconds)
    }
}

fn window(seconds: u64) -> chrono::Duration {
    chrono::Duration::seconds(seconds.min(MAX_OAUTH_WINDOW_SECONDS) as i64)
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON document holding integrations, sync logs and records
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("storage.path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// One `[[integrations]]` entry
///
/// Type and auth method stay raw strings here so that a typo is reported as
/// a configuration error naming the integration instead of a TOML error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationDefinition {
    pub id: String,

    pub name: String,

    /// health-record, pathology, imaging, pharmacy, billing or specialist
    #[serde(rename = "type")]
    pub integration_type: String,

    pub api_endpoint: String,

    /// oauth, api-key or certificate
    pub auth_method: String,

    #[serde(default)]
    pub auto_sync: bool,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// api-key
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// oauth
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// certificate: PEM with the client certificate chain and private key
    #[serde(default)]
    pub certificate_pem: Option<SecretString>,
}

impl IntegrationDefinition {
    /// Converts the definition into a new, inactive integration
    ///
    /// # Errors
    ///
    /// - `UnsupportedAuthMethod` for an auth method outside oauth, api-key
    ///   and certificate
    /// - `Configuration` for an unknown type, a bad id or endpoint, or
    ///   credential fields that do not belong to the auth method
    pub fn to_integration(&self, oauth: &OAuthConfig) -> Result<IntegrationConfig, MedSyncError> {
        let id = IntegrationId::new(self.id.as_str()).map_err(MedSyncError::Configuration)?;
        let integration_type: IntegrationType = self
            .integration_type
            .parse()
            .map_err(|e: String| MedSyncError::Configuration(format!("integration {id}: {e}")))?;
        let method: AuthMethod = self.auth_method.parse()?;

        let credentials = self.credentials(&id, method, oauth)?;

        let mut integration = IntegrationConfig::new(
            id,
            self.name.clone(),
            integration_type,
            self.api_endpoint.trim_end_matches('/'),
            credentials,
        );
        integration.auto_sync = self.auto_sync;
        integration.retry_attempts = self.retry_attempts;
        integration.validate().map_err(MedSyncError::Configuration)?;
        Ok(integration)
    }

    fn credentials(
        &self,
        id: &IntegrationId,
        method: AuthMethod,
        oauth: &OAuthConfig,
    ) -> Result<Credentials, MedSyncError> {
        let mismatch = |field: &str| {
            MedSyncError::Configuration(format!(
                "integration {id}: {field} is not valid with auth_method = \"{method}\""
            ))
        };
        let has_oauth_fields = self.client_id.is_some()
            || self.client_secret.is_some()
            || self.authorization_url.is_some()
            || self.token_url.is_some();

        match method {
            AuthMethod::ApiKey => {
                if has_oauth_fields {
                    return Err(mismatch("client_id/client_secret/authorization_url/token_url"));
                }
                if self.certificate_pem.is_some() {
                    return Err(mismatch("certificate_pem"));
                }
                Ok(Credentials::ApiKey {
                    api_key: non_blank(&self.api_key),
                })
            }
            AuthMethod::Certificate => {
                if has_oauth_fields {
                    return Err(mismatch("client_id/client_secret/authorization_url/token_url"));
                }
                if self.api_key.is_some() {
                    return Err(mismatch("api_key"));
                }
                Ok(Credentials::Certificate {
                    pem: non_blank(&self.certificate_pem),
                })
            }
            AuthMethod::OAuth => {
                if self.api_key.is_some() {
                    return Err(mismatch("api_key"));
                }
                if self.certificate_pem.is_some() {
                    return Err(mismatch("certificate_pem"));
                }
                let required = |value: &Option<String>, field: &str| {
                    value
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            MedSyncError::Configuration(format!(
                                "integration {id}: {field} is required for oauth"
                            ))
                        })
                };
                Ok(Credentials::OAuth(OAuthCredentials {
                    client_id: required(&self.client_id, "client_id")?,
                    client_secret: non_blank(&self.client_secret),
                    authorization_url: required(&self.authorization_url, "authorization_url")?,
                    token_url: required(&self.token_url, "token_url")?,
                    scope: self
                        .scope
                        .clone()
                        .or_else(|| Some(oauth.default_scope.clone())),
                    redirect_uri: self.redirect_uri.clone(),
                    access_token: None,
                    refresh_token: None,
                    expires_at: None,
                }))
            }
        }
    }
}

fn non_blank(secret: &Option<SecretString>) -> Option<SecretString> {
    secret_string_opt(
        secret
            .as_ref()
            .map(|s| s.expose_secret().as_ref().to_string()),
    )
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("medsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_record_timeout_seconds() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_state_ttl_seconds() -> u64 {
    600
}

fn default_token_expiry_skew_seconds() -> u64 {
    60
}

fn default_scope() -> String {
    "openid offline_access".to_string()
}

fn default_storage_path() -> String {
    "./data/medsync-store.json".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use crate::domain::AuthError;

    fn definition(auth_method: &str) -> IntegrationDefinition {
        IntegrationDefinition {
            id: "lab-1".to_string(),
            name: "Sonic Pathology".to_string(),
            integration_type: "pathology".to_string(),
            api_endpoint: "https://lab.example.com/api/".to_string(),
            auth_method: auth_method.to_string(),
            auto_sync: true,
            retry_attempts: 2,
            api_key: None,
            client_id: None,
            client_secret: None,
            authorization_url: None,
            token_url: None,
            scope: None,
            redirect_uri: None,
            certificate_pem: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MedSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.oauth.state_ttl_seconds, 600);
        assert_eq!(config.oauth.token_expiry_skew_seconds, 60);
    }

    #[test]
    fn test_tls_verify_disabled_rejected_in_production() {
        let mut config = MedSyncConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        config.http.tls_verify = false;
        assert!(config.validate().is_err());

        config.environment = Environment::Development;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = MedSyncConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_rotation() {
        let mut config = MedSyncConfig::default();
        config.logging.local_rotation = "size".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_definition_converts() {
        let mut def = definition("api-key");
        def.api_key = Some(secret_string("key-1".to_string()));

        let integration = def.to_integration(&OAuthConfig::default()).unwrap();
        assert_eq!(integration.auth_method(), AuthMethod::ApiKey);
        assert_eq!(integration.api_endpoint, "https://lab.example.com/api");
        assert!(!integration.active);
        assert!(integration.auto_sync);
        assert_eq!(integration.retry_attempts, 2);
        assert!(integration.credentials.is_complete());
    }

    #[test]
    fn test_unknown_auth_method_is_unsupported() {
        let def = definition("basic");
        let err = def.to_integration(&OAuthConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            MedSyncError::Auth(AuthError::UnsupportedAuthMethod(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let mut def = definition("api-key");
        def.integration_type = "radiology".to_string();
        let err = def.to_integration(&OAuthConfig::default()).unwrap_err();
        assert!(matches!(err, MedSyncError::Configuration(_)));
    }

    #[test]
    fn test_mismatched_credentials_rejected() {
        let mut def = definition("certificate");
        def.api_key = Some(secret_string("key-1".to_string()));
        assert!(def.to_integration(&OAuthConfig::default()).is_err());
    }

    #[test]
    fn test_oauth_definition_requires_endpoints() {
        let mut def = definition("oauth");
        def.client_id = Some("portal".to_string());
        assert!(def.to_integration(&OAuthConfig::default()).is_err());

        def.authorization_url = Some("https://auth.example.com/authorize".to_string());
        def.token_url = Some("https://auth.example.com/token".to_string());
        let integration = def.to_integration(&OAuthConfig::default()).unwrap();
        match integration.credentials {
            Credentials::OAuth(oauth) => {
                assert_eq!(oauth.scope.as_deref(), Some("openid offline_access"));
                assert!(oauth.access_token.is_none());
            }
            other => panic!("expected oauth credentials, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut def = definition("api-key");
        def.api_key = Some(secret_string("key-1".to_string()));
        let config = MedSyncConfig {
            integrations: vec![def.clone(), def],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("duplicate"));
    }
}
