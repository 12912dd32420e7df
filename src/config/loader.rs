//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MedSyncConfig;
use crate::domain::errors::MedSyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MedSyncConfig
/// 4. Applies environment variable overrides (MEDSYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use medsync::config::loader::load_config;
///
/// let config = load_config("medsync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MedSyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MedSyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MedSyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(contents: &str) -> Result<MedSyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MedSyncConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        MedSyncError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MedSyncError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        // Comment lines are copied verbatim
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MedSyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using MEDSYNC_* prefix
///
/// Environment variables follow the pattern: MEDSYNC_<SECTION>_<KEY>
/// For example: MEDSYNC_STORAGE_PATH, MEDSYNC_HTTP_TIMEOUT_SECONDS
fn apply_env_overrides(config: &mut MedSyncConfig) {
    fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|v| v.parse().ok())
    }

    // Application overrides
    if let Ok(val) = std::env::var("MEDSYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("MEDSYNC_ENVIRONMENT") {
        match val.to_lowercase().as_str() {
            "development" => config.environment = super::Environment::Development,
            "staging" => config.environment = super::Environment::Staging,
            "production" => config.environment = super::Environment::Production,
            _ => tracing::warn!(value = %val, "Ignoring unknown MEDSYNC_ENVIRONMENT"),
        }
    }

    // HTTP overrides
    if let Some(v) = parsed("MEDSYNC_HTTP_TIMEOUT_SECONDS") {
        config.http.timeout_seconds = v;
    }
    if let Some(v) = parsed("MEDSYNC_HTTP_CONNECT_TIMEOUT_SECONDS") {
        config.http.connect_timeout_seconds = v;
    }
    if let Some(v) = parsed("MEDSYNC_HTTP_TLS_VERIFY") {
        config.http.tls_verify = v;
    }

    // Sync overrides
    if let Some(v) = parsed("MEDSYNC_SYNC_RECORD_TIMEOUT_SECONDS") {
        config.sync.record_timeout_seconds = v;
    }
    if let Some(v) = parsed("MEDSYNC_SYNC_SHUTDOWN_TIMEOUT_SECS") {
        config.sync.shutdown_timeout_secs = v;
    }

    // OAuth overrides
    if let Some(v) = parsed("MEDSYNC_OAUTH_STATE_TTL_SECONDS") {
        config.oauth.state_ttl_seconds = v;
    }
    if let Some(v) = parsed("MEDSYNC_OAUTH_TOKEN_EXPIRY_SKEW_SECONDS") {
        config.oauth.token_expiry_skew_seconds = v;
    }

    // Storage overrides
    if let Ok(val) = std::env::var("MEDSYNC_STORAGE_PATH") {
        config.storage.path = val;
    }

    // Logging overrides
    if let Some(v) = parsed("MEDSYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = v;
    }
    if let Ok(val) = std::env::var("MEDSYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("MEDSYNC_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}
