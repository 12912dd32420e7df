//! Outbound HTTP client construction
//!
//! Every provider call goes through a client built here, so every call
//! carries the configured request and connect timeouts.

use crate::config::{HttpConfig, SecretString};
use crate::domain::{AuthError, MedSyncError, ProviderError, Result};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

/// Longest provider error body echoed into an error message
const MAX_ERROR_BODY: usize = 200;

/// Shared HTTP client factory
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: HttpConfig,
    client: Client,
}

impl HttpTransport {
    /// Builds the shared client
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend cannot be initialized.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Self::builder(config).build().map_err(|e| {
            MedSyncError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn builder(config: &HttpConfig) -> ClientBuilder {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(config.user_agent.clone());

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
    }

    /// Client shared by every integration that authenticates with headers
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Builds a client presenting `pem` as its TLS client identity
    ///
    /// The PEM must hold the certificate chain and the private key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCertificate` if the PEM cannot be parsed into an
    /// identity.
    pub fn client_with_identity(
        &self,
        pem: &SecretString,
    ) -> std::result::Result<Client, AuthError> {
        let identity = reqwest::Identity::from_pem(pem.expose_secret().as_ref().as_bytes())
            .map_err(|e| AuthError::InvalidCertificate(e.to_string()))?;

        Self::builder(&self.config)
            .identity(identity)
            .build()
            .map_err(|e| AuthError::InvalidCertificate(e.to_string()))
    }
}

/// Sends a request and decodes a JSON body from a 2xx response
///
/// # Errors
///
/// - the matching status error for non-2xx responses
/// - `Timeout` / `ConnectionFailed` for transport failures
/// - `InvalidResponse` if the body is not JSON
pub async fn send_json(request: RequestBuilder) -> std::result::Result<Value, ProviderError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(
            status.as_u16(),
            truncate(&body, MAX_ERROR_BODY),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
