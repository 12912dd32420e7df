//! Static bearer API key

use super::AuthenticatedClient;
use crate::config::{fingerprint, SecretString};
use crate::domain::{AuthError, AuthMethod, IntegrationId};
use reqwest::Client;
use secrecy::ExposeSecret;

/// Sends the stored key as `Authorization: Bearer <key>`
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    client: Client,
}

impl ApiKeyAuth {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn authenticate(
        &self,
        integration_id: &IntegrationId,
        api_key: Option<&SecretString>,
    ) -> Result<AuthenticatedClient, AuthError> {
        let key = api_key
            .filter(|k| !k.expose_secret().is_blank())
            .ok_or_else(|| {
                AuthError::MissingCredential(format!(
                    "integration {integration_id} has no API key stored"
                ))
            })?;

        tracing::debug!(
            integration_id = %integration_id,
            key_fingerprint = %fingerprint(key),
            "Using API key authentication"
        );
        Ok(AuthenticatedClient::new(
            self.client.clone(),
            Some(key.clone()),
            AuthMethod::ApiKey,
        ))
    }
}
