//! Authentication adapter
//!
//! Turns an integration's stored credentials into an [`AuthenticatedClient`]
//! that decorates every outbound request. There is one handler per
//! [`Credentials`] variant and the dispatch is an exhaustive match, so no
//! auth method ever falls through to a default.
//!
//! | Method      | Decoration                                       |
//! |-------------|--------------------------------------------------|
//! | api-key     | `Authorization: Bearer <key>`                    |
//! | oauth       | `Authorization: Bearer <access token>`, refreshed |
//! | certificate | TLS client identity, no header                   |

pub mod api_key;
pub mod certificate;
pub mod oauth;

pub use api_key::ApiKeyAuth;
pub use certificate::CertificateAuth;
pub use oauth::OAuthAuth;

use crate::adapters::http::HttpTransport;
use crate::config::SecretString;
use crate::domain::{
    AuthError, AuthMethod, Credentials, IntegrationConfig, IntegrationId, OAuthTokens, Result,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::ExposeSecret;
use std::sync::Arc;

/// Exchanges an integration's stored refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, integration_id: &IntegrationId) -> Result<OAuthTokens>;
}

/// HTTP client bound to one integration's credentials
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: Client,
    bearer: Option<SecretString>,
    method: AuthMethod,
}

impl AuthenticatedClient {
    fn new(client: Client, bearer: Option<SecretString>, method: AuthMethod) -> Self {
        Self {
            client,
            bearer,
            method,
        }
    }

    /// Builds a request carrying the integration's authentication
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer {
            Some(token) => builder.bearer_auth(token.expose_secret().as_ref()),
            None => builder,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Builds authenticated clients for integrations
pub struct AuthAdapter {
    api_key: ApiKeyAuth,
    oauth: OAuthAuth,
    certificate: CertificateAuth,
}

impl AuthAdapter {
    /// # Arguments
    ///
    /// * `transport` - HTTP client factory
    /// * `expiry_skew` - access tokens expiring within this window are
    ///   refreshed before use
    pub fn new(transport: HttpTransport, expiry_skew: chrono::Duration) -> Self {
        let shared = transport.client().clone();
        Self {
            api_key: ApiKeyAuth::new(shared.clone()),
            oauth: OAuthAuth::new(shared, expiry_skew),
            certificate: CertificateAuth::new(transport),
        }
    }

    /// Installs the refresher used for expired OAuth access tokens
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.oauth.set_refresher(refresher);
        self
    }

    /// Authenticates as `config`
    ///
    /// # Errors
    ///
    /// - `MissingCredential` if the secret for the method is absent
    /// - `AuthExpired` if an OAuth token expired and refresh failed
    /// - `InvalidCertificate` if the stored PEM cannot be parsed
    pub async fn authenticate(&self, config: &IntegrationConfig) -> Result<AuthenticatedClient> {
        let client = match &config.credentials {
            Credentials::ApiKey { api_key } => {
                self.api_key.authenticate(&config.id, api_key.as_ref())
            }
            Credentials::OAuth(oauth) => self.oauth.authenticate(&config.id, oauth).await,
            Credentials::Certificate { pem } => {
                self.certificate.authenticate(&config.id, pem.as_ref())
            }
        };
        client.map_err(|e: AuthError| e.into())
    }
}
