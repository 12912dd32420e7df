//! Credential vault
//!
//! Reads and replaces per-integration secrets. Secrets only ever leave the
//! vault inside `secrecy` wrappers; logs carry fingerprints.

use super::registry::IntegrationRegistry;
use crate::config::fingerprint;
use crate::domain::{
    Credentials, IntegrationId, MedSyncError, OAuthCredentials, OAuthTokens, Result,
};
use std::sync::Arc;

pub struct CredentialVault {
    registry: Arc<IntegrationRegistry>,
}

impl CredentialVault {
    pub fn new(registry: Arc<IntegrationRegistry>) -> Self {
        Self { registry }
    }

    pub async fn credentials(&self, id: &IntegrationId) -> Result<Credentials> {
        Ok(self.registry.get(id).await?.credentials)
    }

    /// # Errors
    ///
    /// Returns a configuration error if the integration does not use OAuth.
    pub async fn oauth_credentials(&self, id: &IntegrationId) -> Result<OAuthCredentials> {
        match self.credentials(id).await? {
            Credentials::OAuth(oauth) => Ok(oauth),
            other => Err(not_oauth(id, &other)),
        }
    }

    /// Persists a freshly exchanged token set into the integration's
    /// credentials
    pub async fn store_oauth_tokens(&self, id: &IntegrationId, tokens: OAuthTokens) -> Result<()> {
        let access_fingerprint = fingerprint(&tokens.access_token);
        let rotated_refresh = tokens.refresh_token.is_some();

        self.registry
            .update(id, |config| match &mut config.credentials {
                Credentials::OAuth(oauth) => {
                    oauth.apply_tokens(tokens);
                    Ok(())
                }
                other => Err(not_oauth(id, other)),
            })
            .await?;

        tracing::info!(
            integration_id = %id,
            token_fingerprint = %access_fingerprint,
            rotated_refresh,
            "Stored OAuth tokens"
        );
        Ok(())
    }

    /// Replaces the credential set of an integration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `credentials` belong to a different
    /// auth method than the integration's.
    pub async fn rotate(&self, id: &IntegrationId, credentials: Credentials) -> Result<()> {
        let method = credentials.method();
        self.registry
            .update(id, |config| {
                if config.auth_method() != method {
                    return Err(MedSyncError::Configuration(format!(
                        "integration {id} authenticates with {}, cannot rotate to {method}",
                        config.auth_method()
                    )));
                }
                config.credentials = credentials;
                Ok(())
            })
            .await?;

        tracing::info!(integration_id = %id, auth_method = %method, "Credentials rotated");
        Ok(())
    }
}

fn not_oauth(id: &IntegrationId, credentials: &Credentials) -> MedSyncError {
    MedSyncError::Configuration(format!(
        "integration {id} authenticates with {}, not oauth",
        credentials.method()
    ))
}
