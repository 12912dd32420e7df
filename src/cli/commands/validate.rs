//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the MedSync configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading validates, including every integration definition
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Store: {}", config.storage.path);
        println!(
            "  HTTP Timeout: {}s (connect {}s)",
            config.http.timeout_seconds, config.http.connect_timeout_seconds
        );
        println!("  TLS Verify: {}", config.http.tls_verify);
        println!(
            "  Retry Backoff: {}ms..{}ms x{}",
            config.sync.retry.initial_delay_ms,
            config.sync.retry.max_delay_ms,
            config.sync.retry.backoff_multiplier
        );
        println!("  OAuth State TTL: {}s", config.oauth.state_ttl_seconds);
        println!("  Integrations: {}", config.integrations.len());
        for definition in &config.integrations {
            println!(
                "    - {} ({}, {}) {}",
                definition.id,
                definition.integration_type,
                definition.auth_method,
                definition.api_endpoint
            );
        }
        println!();
        Ok(0)
    }
}
