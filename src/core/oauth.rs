//! OAuth2 authorization-code flow
//!
//! [`OAuthFlowManager`] drives one integration through
//! `idle -> authorizing -> awaiting-callback -> exchanging -> connected`,
//! dropping to `failed` from any non-idle phase.
//!
//! The pending anti-forgery state lives in the persistence collaborator with
//! a TTL and is consumed by the first callback that presents it. The state
//! comparison happens before any network call.

use super::registry::IntegrationRegistry;
use super::vault::CredentialVault;
use crate::adapters::auth::TokenRefresher;
use crate::adapters::http::send_json;
use crate::adapters::store::IntegrationStore;
use crate::config::{secret_string, OAuthConfig};
use crate::domain::{
    AuthError, IntegrationId, IntegrationStatus, MedSyncError, OAuthCredentials, OAuthPhase,
    OAuthState, OAuthTokens, Result,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Entropy of a state token
const STATE_BYTES: usize = 32;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_tokens(self, now: DateTime<Utc>) -> std::result::Result<OAuthTokens, String> {
        if self.access_token.trim().is_empty() {
            return Err("token response has an empty access_token".to_string());
        }
        let expires_at = self
            .expires_in
            .map(|secs| expiry(now, secs))
            .transpose()?;
        Ok(OAuthTokens {
            access_token: secret_string(self.access_token),
            refresh_token: self
                .refresh_token
                .filter(|t| !t.trim().is_empty())
                .map(secret_string),
            expires_at,
        })
    }
}

fn expiry(now: DateTime<Utc>, expires_in: i64) -> std::result::Result<DateTime<Utc>, String> {
    if expires_in < 0 {
        return Err(format!("token response has a negative expires_in ({expires_in})"));
    }
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| format!("token response expires_in out of range ({expires_in})"))
}

pub struct OAuthFlowManager {
    store: Arc<dyn IntegrationStore>,
    registry: Arc<IntegrationRegistry>,
    vault: Arc<CredentialVault>,
    client: Client,
    config: OAuthConfig,
    phases: Mutex<HashMap<IntegrationId, OAuthPhase>>,
}

impl OAuthFlowManager {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        registry: Arc<IntegrationRegistry>,
        vault: Arc<CredentialVault>,
        client: Client,
        config: OAuthConfig,
    ) -> Self {
        Self {
            store,
            registry,
            vault,
            client,
            config,
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Current phase of the integration's authorization
    pub fn phase(&self, id: &IntegrationId) -> OAuthPhase {
        self.phases
            .lock()
            .ok()
            .and_then(|phases| phases.get(id).copied())
            .unwrap_or_default()
    }

    fn set_phase(&self, id: &IntegrationId, phase: OAuthPhase) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.insert(id.clone(), phase);
        }
        tracing::debug!(integration_id = %id, phase = %phase, "OAuth phase changed");
    }

    fn fail(&self, id: &IntegrationId, error: impl Into<MedSyncError>) -> MedSyncError {
        self.set_phase(id, OAuthPhase::Failed);
        error.into()
    }

    /// Starts an authorization attempt and returns the provider URL
    ///
    /// Uses the integration's stored client id. `redirect_uri` overrides the
    /// stored redirect URI. A previous pending attempt is replaced.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the integration does not use OAuth,
    /// has no redirect URI, or its authorization URL is malformed.
    pub async fn begin_authorization(
        &self,
        id: &IntegrationId,
        redirect_uri: Option<&str>,
    ) -> Result<String> {
        let oauth = self.vault.oauth_credentials(id).await?;
        self.set_phase(id, OAuthPhase::Authorizing);

        let redirect_uri = redirect_uri
            .map(str::to_string)
            .or_else(|| oauth.redirect_uri.clone())
            .ok_or_else(|| {
                self.fail(
                    id,
                    MedSyncError::Configuration(format!(
                        "integration {id} has no redirect_uri configured"
                    )),
                )
            })?;
        Url::parse(&redirect_uri).map_err(|e| {
            self.fail(
                id,
                MedSyncError::Configuration(format!("invalid redirect_uri: {e}")),
            )
        })?;

        let pending = OAuthState {
            integration_id: id.clone(),
            state: generate_state(),
            created_at: Utc::now(),
            redirect_uri,
        };
        let url = authorization_url(&oauth, &pending, &self.config.default_scope)
            .map_err(|e| self.fail(id, e))?;

        self.store
            .put_oauth_state(&pending)
            .await
            .map_err(|e| self.fail(id, e))?;
        self.set_phase(id, OAuthPhase::AwaitingCallback);

        tracing::info!(integration_id = %id, "Authorization started");
        Ok(url.into())
    }

    /// Completes an authorization attempt from the provider callback
    ///
    /// # Errors
    ///
    /// - `InvalidOAuthState` if no attempt is pending, it expired, or
    ///   `returned_state` does not match. A mismatch leaves the pending
    ///   attempt in place until it expires. Nothing is sent to the provider
    ///   in these cases.
    /// - `TokenExchangeFailed` if the token endpoint rejects the code; no
    ///   tokens are stored
    pub async fn complete_authorization(
        &self,
        id: &IntegrationId,
        code: &str,
        returned_state: &str,
    ) -> Result<()> {
        let pending = self.store.get_pending_oauth_state(id).await?.ok_or_else(|| {
            AuthError::InvalidOAuthState(format!("no pending authorization for integration {id}"))
        })?;

        if pending.is_expired(Utc::now(), self.config.state_ttl()) {
            self.store.delete_oauth_state(id).await?;
            return Err(self.fail(
                id,
                AuthError::InvalidOAuthState("authorization attempt expired".to_string()),
            ));
        }

        if !constant_time_eq(pending.state.as_bytes(), returned_state.as_bytes()) {
            tracing::warn!(integration_id = %id, "OAuth callback state mismatch");
            return Err(
                AuthError::InvalidOAuthState("state does not match".to_string()).into(),
            );
        }

        // Single use
        self.store.delete_oauth_state(id).await?;
        self.set_phase(id, OAuthPhase::Exchanging);

        let oauth = self
            .vault
            .oauth_credentials(id)
            .await
            .map_err(|e| self.fail(id, e))?;
        let form = TokenRequest {
            grant_type: "authorization_code",
            code: Some(code),
            redirect_uri: Some(&pending.redirect_uri),
            refresh_token: None,
            client_id: &oauth.client_id,
            client_secret: oauth
                .client_secret
                .as_ref()
                .map(|s| s.expose_secret().as_ref()),
        };

        let tokens = self
            .request_tokens(&oauth.token_url, &form)
            .await
            .map_err(|msg| {
                tracing::warn!(integration_id = %id, error = %msg, "Token exchange failed");
                self.fail(id, AuthError::TokenExchangeFailed(msg))
            })?;

        self.vault
            .store_oauth_tokens(id, tokens)
            .await
            .map_err(|e| self.fail(id, e))?;
        self.registry
            .set_status(id, IntegrationStatus::Connected)
            .await?;
        self.set_phase(id, OAuthPhase::Connected);

        tracing::info!(integration_id = %id, "Authorization completed");
        Ok(())
    }

    /// Exchanges the stored refresh token for a new access token
    ///
    /// # Errors
    ///
    /// Returns `RefreshFailed` if there is no refresh token or the token
    /// endpoint call fails. Stored credentials are left untouched.
    pub async fn refresh(&self, id: &IntegrationId) -> Result<OAuthTokens> {
        let oauth = self.vault.oauth_credentials(id).await?;
        let refresh_token = oauth
            .refresh_token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_blank())
            .ok_or_else(|| {
                AuthError::RefreshFailed(format!("integration {id} has no refresh token"))
            })?;

        let form = TokenRequest {
            grant_type: "refresh_token",
            code: None,
            redirect_uri: None,
            refresh_token: Some(refresh_token.as_ref()),
            client_id: &oauth.client_id,
            client_secret: oauth
                .client_secret
                .as_ref()
                .map(|s| s.expose_secret().as_ref()),
        };

        let tokens = self
            .request_tokens(&oauth.token_url, &form)
            .await
            .map_err(|msg| {
                tracing::warn!(integration_id = %id, error = %msg, "Token refresh failed");
                AuthError::RefreshFailed(msg)
            })?;

        self.vault.store_oauth_tokens(id, tokens.clone()).await?;
        Ok(tokens)
    }

    async fn request_tokens(
        &self,
        token_url: &str,
        form: &TokenRequest<'_>,
    ) -> std::result::Result<OAuthTokens, String> {
        let body = send_json(self.client.post(token_url).form(form))
            .await
            .map_err(|e| e.to_string())?;
        let response: TokenResponse = serde_json::from_value(body)
            .map_err(|e| format!("malformed token response: {e}"))?;
        response.into_tokens(Utc::now())
    }
}

#[async_trait]
impl TokenRefresher for OAuthFlowManager {
    async fn refresh(&self, integration_id: &IntegrationId) -> Result<OAuthTokens> {
        OAuthFlowManager::refresh(self, integration_id).await
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn authorization_url(
    oauth: &OAuthCredentials,
    pending: &OAuthState,
    default_scope: &str,
) -> Result<Url> {
    let scope = oauth.scope.as_deref().unwrap_or(default_scope);
    Url::parse_with_params(
        &oauth.authorization_url,
        &[
            ("response_type", "code"),
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("scope", scope),
            ("state", pending.state.as_str()),
        ],
    )
    .map_err(|e| MedSyncError::Configuration(format!("invalid authorization_url: {e}")))
}

/// Comparison time independent of where the inputs first differ
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
