//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "medsync.toml")]
    pub output: String,

    /// Include sample integrations and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing MedSync configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} and add your [[integrations]]", self.output);
                println!("  2. Put provider secrets in a .env file and reference them as ${{VAR}}");
                println!("  3. Validate configuration: medsync validate-config");
                println!("  4. Register integrations: medsync integrations import");
                println!("  5. For OAuth providers: medsync oauth begin <ID>");
                println!("  6. Activate and sync: medsync integrations activate <ID> && medsync sync <ID>");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# MedSync Configuration File
# Healthcare Integration Sync Engine

environment = "development"

[application]
log_level = "info"

[http]
timeout_seconds = 30
connect_timeout_seconds = 10
tls_verify = true

[sync]
record_timeout_seconds = 30
shutdown_timeout_secs = 30

[sync.retry]
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 2.0

[oauth]
state_ttl_seconds = 600
token_expiry_skew_seconds = 60

[storage]
path = "./data/medsync-store.json"

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with sample integrations
    fn generate_config_with_examples() -> String {
        let mut config = Self::generate_minimal_config();
        config.push_str(
            r#"
# Integrations are registered inactive by `medsync integrations import`.
# Secrets should come from the environment via ${VAR} substitution.

# API key: key sent in the X-API-Key header
[[integrations]]
id = "sonic-lab"
name = "Sonic Pathology"
type = "pathology"
api_endpoint = "https://api.sonichealthcare.example/v2"
auth_method = "api-key"
api_key = "${MEDSYNC_SONIC_API_KEY}"
auto_sync = true
retry_attempts = 3

# OAuth: authorize with `medsync oauth begin my-health-record`
[[integrations]]
id = "my-health-record"
name = "My Health Record"
type = "health-record"
api_endpoint = "https://fhir.digitalhealth.example/fhir"
auth_method = "oauth"
client_id = "medsync-clinic"
client_secret = "${MEDSYNC_MHR_CLIENT_SECRET}"
authorization_url = "https://auth.digitalhealth.example/authorize"
token_url = "https://auth.digitalhealth.example/token"
redirect_uri = "https://clinic.example/oauth/callback"
scope = "patient/*.read offline_access"

# Certificate: PEM bundle with client certificate and private key
# [[integrations]]
# id = "medicare-claims"
# name = "Medicare Online"
# type = "billing"
# api_endpoint = "https://claims.medicare.example/api"
# auth_method = "certificate"
# certificate_pem = "${MEDSYNC_MEDICARE_PEM}"
"#,
        );
        config
    }
}
