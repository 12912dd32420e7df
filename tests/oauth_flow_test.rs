//! OAuth authorization-code handshake and token refresh against a mock
//! provider

use chrono::{Duration as ChronoDuration, Utc};
use medsync::adapters::providers::StrategyRegistry;
use medsync::adapters::store::{IntegrationStore, MemoryStore};
use medsync::config::{secret_string, MedSyncConfig};
use medsync::core::IntegrationService;
use medsync::domain::{
    AuthError, Credentials, IntegrationConfig, IntegrationId, IntegrationStatus, IntegrationType,
    MedSyncError, OAuthCredentials, OAuthPhase, OAuthTokens,
};
use mockito::Matcher;
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

const REDIRECT_URI: &str = "https://clinic.example/oauth/callback";

struct Harness {
    service: IntegrationService,
    store: Arc<MemoryStore>,
    id: IntegrationId,
    _shutdown: watch::Sender<bool>,
}

async fn harness(server_url: &str) -> Harness {
    let (tx, rx) = watch::channel(false);
    let store = Arc::new(MemoryStore::new());
    let service = IntegrationService::with_store(
        MedSyncConfig::default(),
        store.clone(),
        StrategyRegistry::with_defaults(),
        rx,
    )
    .unwrap();

    let id = IntegrationId::new("mhr").unwrap();
    let credentials = Credentials::OAuth(OAuthCredentials {
        client_id: "medsync-clinic".to_string(),
        client_secret: Some(secret_string("s3cret".to_string())),
        authorization_url: format!("{server_url}/authorize"),
        token_url: format!("{server_url}/token"),
        scope: Some("patient/*.read offline_access".to_string()),
        redirect_uri: Some(REDIRECT_URI.to_string()),
        access_token: None,
        refresh_token: None,
        expires_at: None,
    });
    let config = IntegrationConfig::new(
        id.clone(),
        "My Health Record",
        IntegrationType::HealthRecord,
        format!("{server_url}/fhir"),
        credentials,
    );
    service.registry().create(config).await.unwrap();

    Harness {
        service,
        store,
        id,
        _shutdown: tx,
    }
}

fn state_of(authorization_url: &str) -> String {
    Url::parse(authorization_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn token_body(access: &str, refresh: &str) -> String {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": 3600
    })
    .to_string()
}

#[tokio::test]
async fn test_authorization_code_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;

    let url = h.service.begin_oauth(&h.id, None).await.unwrap();
    assert!(url.starts_with(&format!("{}/authorize?", server.url())));
    let params: Vec<(String, String)> = Url::parse(&url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(params.contains(&("client_id".to_string(), "medsync-clinic".to_string())));
    assert!(params.contains(&("redirect_uri".to_string(), REDIRECT_URI.to_string())));
    assert!(params.contains(&("response_type".to_string(), "code".to_string())));
    let state = state_of(&url);

    let exchange = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code-1".into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
            Matcher::UrlEncoded("client_id".into(), "medsync-clinic".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("at-1", "rt-1"))
        .expect(1)
        .create_async()
        .await;

    h.service
        .complete_oauth(&h.id, "auth-code-1", &state)
        .await
        .unwrap();
    exchange.assert_async().await;

    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert_eq!(
        oauth.access_token.as_ref().unwrap().expose_secret().as_ref(),
        "at-1"
    );
    assert_eq!(
        oauth.refresh_token.as_ref().unwrap().expose_secret().as_ref(),
        "rt-1"
    );
    assert!(oauth.expires_at.unwrap() > Utc::now());

    let stored = h.service.registry().get(&h.id).await.unwrap();
    assert_eq!(stored.status, IntegrationStatus::Connected);
    assert!(!stored.active);
}

#[tokio::test]
async fn test_state_is_single_use() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    let exchange = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(token_body("at-1", "rt-1"))
        .expect(1)
        .create_async()
        .await;

    let state = state_of(&h.service.begin_oauth(&h.id, None).await.unwrap());
    h.service.complete_oauth(&h.id, "code", &state).await.unwrap();

    let err = h
        .service
        .complete_oauth(&h.id, "code", &state)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MedSyncError::Auth(AuthError::InvalidOAuthState(_))
    ));
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_state_mismatch_stores_nothing() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    let exchange = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    h.service.begin_oauth(&h.id, None).await.unwrap();
    let err = h
        .service
        .complete_oauth(&h.id, "code", "forged-state")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_OAUTH_STATE");

    exchange.assert_async().await;
    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert!(oauth.access_token.is_none());
    assert_eq!(
        h.service.registry().get(&h.id).await.unwrap().status,
        IntegrationStatus::Disconnected
    );
}

#[tokio::test]
async fn test_forged_callback_leaves_pending_authorization_usable() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    let exchange = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(token_body("at-1", "rt-1"))
        .expect(1)
        .create_async()
        .await;

    let state = state_of(&h.service.begin_oauth(&h.id, None).await.unwrap());
    assert!(h
        .service
        .complete_oauth(&h.id, "code", "forged-state")
        .await
        .is_err());
    assert_eq!(h.service.oauth_phase(&h.id), OAuthPhase::AwaitingCallback);

    h.service
        .complete_oauth(&h.id, "real-code", &state)
        .await
        .unwrap();
    exchange.assert_async().await;
    assert_eq!(
        h.service.registry().get(&h.id).await.unwrap().status,
        IntegrationStatus::Connected
    );
}

#[tokio::test]
async fn test_expired_state_is_rejected_before_exchange() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    let exchange = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let state = state_of(&h.service.begin_oauth(&h.id, None).await.unwrap());
    let mut pending = h
        .store
        .get_pending_oauth_state(&h.id)
        .await
        .unwrap()
        .unwrap();
    pending.created_at = Utc::now() - ChronoDuration::hours(1);
    h.store.put_oauth_state(&pending).await.unwrap();

    let err = h
        .service
        .complete_oauth(&h.id, "code", &state)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MedSyncError::Auth(AuthError::InvalidOAuthState(_))
    ));

    exchange.assert_async().await;
    assert!(h.store.get_pending_oauth_state(&h.id).await.unwrap().is_none());
    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert!(oauth.access_token.is_none());
}

#[tokio::test]
async fn test_out_of_range_expiry_fails_exchange() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(
            json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "expires_in": 9_000_000_000_000_000i64
            })
            .to_string(),
        )
        .create_async()
        .await;

    let state = state_of(&h.service.begin_oauth(&h.id, None).await.unwrap());
    let err = h
        .service
        .complete_oauth(&h.id, "code", &state)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_EXCHANGE_FAILED");
    assert_eq!(h.service.oauth_phase(&h.id), OAuthPhase::Failed);

    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert!(oauth.access_token.is_none());
}

#[tokio::test]
async fn test_rejected_code_is_token_exchange_failure() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let state = state_of(&h.service.begin_oauth(&h.id, None).await.unwrap());
    let err = h
        .service
        .complete_oauth(&h.id, "stale-code", &state)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_EXCHANGE_FAILED");

    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert!(oauth.access_token.is_none());
}

#[tokio::test]
async fn test_redirect_override_is_sent_to_provider() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    let override_uri = "https://clinic.example/alt/callback";

    let exchange = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded(
            "redirect_uri".into(),
            override_uri.into(),
        ))
        .with_status(200)
        .with_body(token_body("at-1", "rt-1"))
        .expect(1)
        .create_async()
        .await;

    let url = h
        .service
        .begin_oauth(&h.id, Some(override_uri))
        .await
        .unwrap();
    h.service
        .complete_oauth(&h.id, "code", &state_of(&url))
        .await
        .unwrap();
    exchange.assert_async().await;
}

async fn store_expired_tokens(h: &Harness) {
    h.service
        .vault()
        .store_oauth_tokens(
            &h.id,
            OAuthTokens {
                access_token: secret_string("at-old".to_string()),
                refresh_token: Some(secret_string("rt-old".to_string())),
                expires_at: Some(Utc::now() - ChronoDuration::minutes(5)),
            },
        )
        .await
        .unwrap();
    h.service.registry().set_active(&h.id, true).await.unwrap();
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_sync() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    store_expired_tokens(&h).await;

    let refresh = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "rt-old".into()),
        ]))
        .with_status(200)
        .with_body(token_body("at-new", "rt-new"))
        .expect(1)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/fhir/Patient")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer at-new")
        .with_status(200)
        .with_body(json!({ "resourceType": "Bundle", "entry": [] }).to_string())
        .expect(1)
        .create_async()
        .await;

    let result = h.service.sync(&h.id).await.unwrap();
    assert!(result.success);
    refresh.assert_async().await;
    listing.assert_async().await;

    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert_eq!(
        oauth.access_token.as_ref().unwrap().expose_secret().as_ref(),
        "at-new"
    );
    assert_eq!(
        oauth.refresh_token.as_ref().unwrap().expose_secret().as_ref(),
        "rt-new"
    );
}

#[tokio::test]
async fn test_failed_refresh_keeps_credentials() {
    let mut server = mockito::Server::new_async().await;
    let h = harness(&server.url()).await;
    store_expired_tokens(&h).await;
    let before = h.service.registry().get(&h.id).await.unwrap().status;

    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/fhir/Patient")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = h.service.sync(&h.id).await.unwrap_err();
    assert_eq!(err.code(), "AUTH_EXPIRED");
    listing.assert_async().await;

    let oauth = h.service.vault().oauth_credentials(&h.id).await.unwrap();
    assert_eq!(
        oauth.access_token.as_ref().unwrap().expose_secret().as_ref(),
        "at-old"
    );
    assert_eq!(
        oauth.refresh_token.as_ref().unwrap().expose_secret().as_ref(),
        "rt-old"
    );
    assert_eq!(h.service.registry().get(&h.id).await.unwrap().status, before);
}
