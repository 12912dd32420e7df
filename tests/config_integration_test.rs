//! Integration tests for configuration loading, validation and import
//!
//! Note: Tests that modify environment variables are serialized through
//! `ENV_MUTEX` to avoid interference between tests.

use medsync::config::{load_config, Environment};
use medsync::core::IntegrationService;
use medsync::domain::{AuthMethod, IntegrationId, IntegrationStatus, IntegrationType};
use std::io::Write;
use std::sync::Mutex;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::watch;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    std::env::remove_var("MEDSYNC_APPLICATION_LOG_LEVEL");
    std::env::remove_var("MEDSYNC_STORAGE_PATH");
    std::env::remove_var("MEDSYNC_HTTP_TIMEOUT_SECONDS");
    std::env::remove_var("TEST_SONIC_API_KEY");
    std::env::remove_var("TEST_MHR_SECRET");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const FULL_CONFIG: &str = r#"
environment = "staging"

[application]
log_level = "debug"

[http]
timeout_seconds = 45
connect_timeout_seconds = 5
user_agent = "medsync-test"
tls_verify = true

[sync]
record_timeout_seconds = 10
shutdown_timeout_secs = 15

[sync.retry]
initial_delay_ms = 250
max_delay_ms = 4000
backoff_multiplier = 3.0

[oauth]
state_ttl_seconds = 300
token_expiry_skew_seconds = 30
default_scope = "openid"

[storage]
path = "/var/lib/medsync/store.json"

[logging]
local_enabled = false
local_path = "/tmp/medsync"
local_rotation = "hourly"

[[integrations]]
id = "sonic-lab"
name = "Sonic Pathology"
type = "pathology"
api_endpoint = "https://lab.example.com/api"
auth_method = "api-key"
api_key = "${TEST_SONIC_API_KEY}"
auto_sync = true
retry_attempts = 5

[[integrations]]
id = "mhr"
name = "My Health Record"
type = "health-record"
api_endpoint = "https://fhir.example.com"
auth_method = "oauth"
client_id = "clinic"
client_secret = "${TEST_MHR_SECRET}"
authorization_url = "https://auth.example.com/authorize"
token_url = "https://auth.example.com/token"
redirect_uri = "https://clinic.example/callback"
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_SONIC_API_KEY", "sonic-key");
    std::env::set_var("TEST_MHR_SECRET", "mhr-secret");

    let file = write_config(FULL_CONFIG);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.http.timeout_seconds, 45);
    assert_eq!(config.http.user_agent, "medsync-test");
    assert_eq!(config.sync.record_timeout_seconds, 10);
    assert_eq!(config.sync.retry.initial_delay_ms, 250);
    assert_eq!(config.oauth.state_ttl_seconds, 300);
    assert_eq!(config.oauth.default_scope, "openid");
    assert_eq!(config.storage.path, "/var/lib/medsync/store.json");
    assert!(!config.logging.local_enabled);
    assert_eq!(config.integrations.len(), 2);

    let sonic = config.integrations[0].to_integration(&config.oauth).unwrap();
    assert_eq!(sonic.integration_type, IntegrationType::Pathology);
    assert_eq!(sonic.auth_method(), AuthMethod::ApiKey);
    assert_eq!(sonic.retry_attempts, 5);
    assert!(sonic.auto_sync);

    let mhr = config.integrations[1].to_integration(&config.oauth).unwrap();
    assert_eq!(mhr.auth_method(), AuthMethod::OAuth);

    cleanup_env_vars();
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[application]\nlog_level = \"info\"\n");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.http.timeout_seconds, 30);
    assert!(config.http.tls_verify);
    assert_eq!(config.oauth.state_ttl_seconds, 600);
    assert_eq!(config.oauth.token_expiry_skew_seconds, 60);
    assert_eq!(config.storage.path, "./data/medsync-store.json");
    assert!(config.integrations.is_empty());
}

#[test]
fn test_missing_env_var_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(FULL_CONFIG);
    let err = load_config(file.path()).unwrap_err().to_string();
    assert!(err.contains("TEST_SONIC_API_KEY"));
    assert!(err.contains("TEST_MHR_SECRET"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("MEDSYNC_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("MEDSYNC_STORAGE_PATH", "/srv/medsync.json");
    std::env::set_var("MEDSYNC_HTTP_TIMEOUT_SECONDS", "90");

    let file = write_config("[application]\nlog_level = \"info\"\n");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.storage.path, "/srv/medsync.json");
    assert_eq!(config.http.timeout_seconds, 90);

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        "[application]\nlog_level = \"verbose\"\n",
        "environment = \"production\"\n[http]\ntls_verify = false\n",
        "[oauth]\nstate_ttl_seconds = 0\n",
        "[sync.retry]\nbackoff_multiplier = 0.5\n",
        "[[integrations]]\nid = \"x\"\nname = \"X\"\ntype = \"radiology\"\napi_endpoint = \"https://x\"\nauth_method = \"api-key\"\napi_key = \"k\"\n",
        "[[integrations]]\nid = \"x\"\nname = \"X\"\ntype = \"billing\"\napi_endpoint = \"https://x\"\nauth_method = \"basic\"\n",
    ];
    for contents in cases {
        let file = write_config(contents);
        assert!(
            load_config(file.path()).is_err(),
            "expected validation failure for:\n{contents}"
        );
    }
}

#[tokio::test]
async fn test_import_persists_across_reopen() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_SONIC_API_KEY", "sonic-key");
    std::env::set_var("TEST_MHR_SECRET", "mhr-secret");

    let dir = TempDir::new().unwrap();
    let file = write_config(FULL_CONFIG);
    let mut config = load_config(file.path()).unwrap();
    config.storage.path = dir.path().join("store.json").to_string_lossy().into_owned();
    cleanup_env_vars();

    let (_tx, rx) = watch::channel(false);
    let service = IntegrationService::new(config.clone(), rx.clone())
        .await
        .unwrap();
    let report = service.import_configured().await.unwrap();
    assert_eq!(report.created.len(), 2);
    assert!(report.skipped.is_empty());
    drop(service);

    let reopened = IntegrationService::new(config, rx).await.unwrap();
    let report = reopened.import_configured().await.unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.skipped.len(), 2);

    let sonic = reopened
        .registry()
        .get(&IntegrationId::new("sonic-lab").unwrap())
        .await
        .unwrap();
    assert!(!sonic.active);
    assert_eq!(sonic.status, IntegrationStatus::Disconnected);

    let summaries = reopened.registry().summaries().await.unwrap();
    let rendered = serde_json::to_string(&summaries).unwrap();
    assert!(!rendered.contains("sonic-key"));
    assert!(!rendered.contains("mhr-secret"));
}
