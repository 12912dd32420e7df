//! Domain error types
//!
//! This module defines the error hierarchy for MedSync. Errors never expose
//! third-party types and never carry secret material in their messages.

use thiserror::Error;

/// Taxonomy bucket an error belongs to
///
/// The kind decides how the sync path treats a failure: configuration and
/// authentication errors go straight back to the caller, transient network
/// errors are retried, partial record errors are folded into the
/// [`SyncResult`](crate::domain::SyncResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration, unsupported auth method
    Configuration,
    /// Expired or invalid credentials, OAuth failures
    Authentication,
    /// Timeouts, connection failures and 5xx responses
    TransientNetwork,
    /// One record failed mapping or persistence
    PartialRecord,
    /// A sync is already running for the integration
    Concurrency,
    /// Persistence collaborator failures
    Storage,
    /// The process is shutting down
    Shutdown,
}

/// Main MedSync error type
#[derive(Debug, Error)]
pub enum MedSyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The integration id does not resolve in the registry
    #[error("Integration not found: {0}")]
    IntegrationNotFound(String),

    /// The integration exists but has not been activated
    #[error("Integration is not active: {0}")]
    IntegrationInactive(String),

    /// A second sync was requested while one is in flight
    #[error("Sync already in progress for integration {0}")]
    SyncAlreadyInProgress(String),

    /// Authentication-related errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Provider (outbound HTTP) errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync aborted by shutdown
    #[error("Sync aborted: {0}")]
    Aborted(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl MedSyncError {
    /// Returns the taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MedSyncError::Configuration(_)
            | MedSyncError::IntegrationNotFound(_)
            | MedSyncError::IntegrationInactive(_) => ErrorKind::Configuration,
            MedSyncError::SyncAlreadyInProgress(_) => ErrorKind::Concurrency,
            MedSyncError::Auth(e) => e.kind(),
            MedSyncError::Provider(e) => e.kind(),
            MedSyncError::Store(_) | MedSyncError::Serialization(_) | MedSyncError::Io(_) => {
                ErrorKind::Storage
            }
            MedSyncError::Aborted(_) => ErrorKind::Shutdown,
        }
    }

    /// Machine-readable code recorded on failed sync log entries
    pub fn code(&self) -> &'static str {
        match self {
            MedSyncError::Configuration(_) => "CONFIGURATION_ERROR",
            MedSyncError::IntegrationNotFound(_) => "INTEGRATION_NOT_FOUND",
            MedSyncError::IntegrationInactive(_) => "INTEGRATION_INACTIVE",
            MedSyncError::SyncAlreadyInProgress(_) => "SYNC_ALREADY_IN_PROGRESS",
            MedSyncError::Auth(e) => e.code(),
            MedSyncError::Provider(e) => e.code(),
            MedSyncError::Store(_) => "STORAGE_ERROR",
            MedSyncError::Aborted(_) => "ABORTED",
            MedSyncError::Serialization(_) => "SERIALIZATION_ERROR",
            MedSyncError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the sync path may retry this error internally
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }
}

/// Authentication errors
///
/// Raised by the auth adapter and the OAuth flow manager. None of these are
/// retried by the sync path; they require configuration changes or
/// out-of-band reauthorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No secret of the required shape is stored
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Access token expired and could not be refreshed
    #[error("Access token expired and refresh failed; reauthorization required: {0}")]
    AuthExpired(String),

    /// Stored PEM could not be parsed into a client identity
    #[error("Invalid client certificate: {0}")]
    InvalidCertificate(String),

    /// Auth method outside of oauth | api-key | certificate
    #[error("Unsupported auth method: {0}")]
    UnsupportedAuthMethod(String),

    /// OAuth callback state is absent, expired, reused or mismatched
    #[error("Invalid OAuth state: {0}")]
    InvalidOAuthState(String),

    /// Refresh token exchange failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Authorization code exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
}

impl AuthError {
    /// Returns the taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingCredential(_)
            | AuthError::InvalidCertificate(_)
            | AuthError::UnsupportedAuthMethod(_) => ErrorKind::Configuration,
            AuthError::AuthExpired(_)
            | AuthError::InvalidOAuthState(_)
            | AuthError::RefreshFailed(_)
            | AuthError::TokenExchangeFailed(_) => ErrorKind::Authentication,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential(_) => "MISSING_CREDENTIAL",
            AuthError::AuthExpired(_) => "AUTH_EXPIRED",
            AuthError::InvalidCertificate(_) => "INVALID_CERTIFICATE",
            AuthError::UnsupportedAuthMethod(_) => "UNSUPPORTED_AUTH_METHOD",
            AuthError::InvalidOAuthState(_) => "INVALID_OAUTH_STATE",
            AuthError::RefreshFailed(_) => "REFRESH_FAILED",
            AuthError::TokenExchangeFailed(_) => "TOKEN_EXCHANGE_FAILED",
        }
    }
}

/// Provider errors
///
/// Errors that occur when talking to an external provider endpoint.
/// These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to connect to the provider
    #[error("Failed to connect to provider: {0}")]
    ConnectionFailed(String),

    /// Request exceeded its timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Provider rejected the credentials (401/403)
    #[error("Provider rejected credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Rate limited (429)
    #[error("Rate limit exceeded ({status}): {message}")]
    RateLimited { status: u16, message: String },

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Builds the error matching a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProviderError::Unauthorized { status, message },
            429 => ProviderError::RateLimited { status, message },
            500..=599 => ProviderError::ServerError { status, message },
            _ => ProviderError::ClientError { status, message },
        }
    }

    /// Whether the failure is eligible for retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::ConnectionFailed(_)
                | ProviderError::Timeout(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::ServerError { .. }
        )
    }

    /// Returns the taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Unauthorized { .. } => ErrorKind::Authentication,
            e if e.is_transient() => ErrorKind::TransientNetwork,
            _ => ErrorKind::PartialRecord,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::ConnectionFailed(_) => "CONNECTION_FAILED",
            ProviderError::Timeout(_) => "TIMEOUT",
            ProviderError::Unauthorized { .. } => "PROVIDER_UNAUTHORIZED",
            ProviderError::RateLimited { .. } => "RATE_LIMITED",
            ProviderError::ServerError { .. } => "PROVIDER_SERVER_ERROR",
            ProviderError::ClientError { .. } => "PROVIDER_CLIENT_ERROR",
            ProviderError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), err.to_string())
        } else {
            ProviderError::ConnectionFailed(err.to_string())
        }
    }
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity already exists
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Entity not found where one was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempt to mutate a sync log entry that already left in-progress
    #[error("Sync log entry {0} is finalized and cannot be modified")]
    LogFinalized(String),

    /// Backing medium failure
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for MedSyncError {
    fn from(err: std::io::Error) -> Self {
        MedSyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MedSyncError {
    fn from(err: serde_json::Error) -> Self {
        MedSyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MedSyncError {
    fn from(err: toml::de::Error) -> Self {
        MedSyncError::Configuration(format!("TOML parse error: {err}"))
    }
}
