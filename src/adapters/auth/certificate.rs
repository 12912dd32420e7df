//! Client certificate (mTLS)
//!
//! The certificate is presented at the TLS layer, so requests carry no
//! `Authorization` header. Clients are cached per integration and rebuilt
//! when the stored PEM changes.

use super::AuthenticatedClient;
use crate::adapters::http::HttpTransport;
use crate::config::{fingerprint, SecretString};
use crate::domain::{AuthError, AuthMethod, IntegrationId};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct CertificateAuth {
    transport: HttpTransport,
    /// integration id -> (PEM fingerprint, client)
    clients: Mutex<HashMap<IntegrationId, (String, Client)>>,
}

impl CertificateAuth {
    pub fn new(transport: HttpTransport) -> Self {
        Self {
            transport,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn authenticate(
        &self,
        integration_id: &IntegrationId,
        pem: Option<&SecretString>,
    ) -> Result<AuthenticatedClient, AuthError> {
        let pem = pem
            .filter(|p| !p.expose_secret().is_blank())
            .ok_or_else(|| {
                AuthError::MissingCredential(format!(
                    "integration {integration_id} has no client certificate stored"
                ))
            })?;
        let pem_fingerprint = fingerprint(pem);

        if let Some(client) = self.cached(integration_id, &pem_fingerprint) {
            return Ok(AuthenticatedClient::new(client, None, AuthMethod::Certificate));
        }

        let client = self.transport.client_with_identity(pem).map_err(|e| {
            tracing::warn!(
                integration_id = %integration_id,
                cert_fingerprint = %pem_fingerprint,
                "Stored client certificate could not be parsed"
            );
            e
        })?;

        tracing::debug!(
            integration_id = %integration_id,
            cert_fingerprint = %pem_fingerprint,
            "Built mTLS client"
        );
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(
                integration_id.clone(),
                (pem_fingerprint, client.clone()),
            );
        }
        Ok(AuthenticatedClient::new(client, None, AuthMethod::Certificate))
    }

    fn cached(&self, integration_id: &IntegrationId, pem_fingerprint: &str) -> Option<Client> {
        let clients = self.clients.lock().ok()?;
        clients
            .get(integration_id)
            .filter(|(fp, _)| fp == pem_fingerprint)
            .map(|(_, client)| client.clone())
    }
}
