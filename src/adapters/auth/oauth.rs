//! OAuth2 bearer access token

use super::{AuthenticatedClient, TokenRefresher};
use crate::config::fingerprint;
use crate::domain::{AuthError, AuthMethod, IntegrationId, OAuthCredentials};
use chrono::{Duration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::sync::Arc;

/// Sends the stored access token, refreshing it first when it is about to
/// expire
pub struct OAuthAuth {
    client: Client,
    refresher: Option<Arc<dyn TokenRefresher>>,
    expiry_skew: Duration,
}

impl OAuthAuth {
    pub fn new(client: Client, expiry_skew: Duration) -> Self {
        Self {
            client,
            refresher: None,
            expiry_skew,
        }
    }

    pub fn set_refresher(&mut self, refresher: Arc<dyn TokenRefresher>) {
        self.refresher = Some(refresher);
    }

    /// # Errors
    ///
    /// - `MissingCredential` if no access token has been obtained yet
    /// - `AuthExpired` if the token expired and could not be refreshed. The
    ///   integration status is left as it was; the user must reauthorize.
    pub async fn authenticate(
        &self,
        integration_id: &IntegrationId,
        credentials: &OAuthCredentials,
    ) -> Result<AuthenticatedClient, AuthError> {
        let stored = credentials
            .access_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_blank())
            .ok_or_else(|| {
                AuthError::MissingCredential(format!(
                    "integration {integration_id} has not completed OAuth authorization"
                ))
            })?;

        if !credentials.is_expired(Utc::now(), self.expiry_skew) {
            return Ok(AuthenticatedClient::new(
                self.client.clone(),
                Some(stored.clone()),
                AuthMethod::OAuth,
            ));
        }

        let refresher = self.refresher.as_ref().ok_or_else(|| {
            AuthError::AuthExpired(format!(
                "integration {integration_id}: access token expired and no refresher is configured"
            ))
        })?;

        tracing::info!(integration_id = %integration_id, "Access token expired, refreshing");
        match refresher.refresh(integration_id).await {
            Ok(tokens) => {
                tracing::debug!(
                    integration_id = %integration_id,
                    token_fingerprint = %fingerprint(&tokens.access_token),
                    "Using refreshed access token"
                );
                Ok(AuthenticatedClient::new(
                    self.client.clone(),
                    Some(tokens.access_token),
                    AuthMethod::OAuth,
                ))
            }
            Err(e) => {
                tracing::warn!(
                    integration_id = %integration_id,
                    error = %e,
                    "Token refresh failed; reauthorization required"
                );
                Err(AuthError::AuthExpired(format!(
                    "integration {integration_id}: {e}"
                )))
            }
        }
    }
}
