//! Configuration management for MedSync.
//!
//! TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MEDSYNC_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section before the config is returned
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use medsync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("medsync.toml")?;
//!
//! println!("Store: {}", config.storage.path);
//! for definition in &config.integrations {
//!     println!("{} ({})", definition.id, definition.integration_type);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [storage]
//! path = "/var/lib/medsync/store.json"
//!
//! [[integrations]]
//! id = "sonic-lab"
//! name = "Sonic Pathology"
//! type = "pathology"
//! api_endpoint = "https://lab.example.com/api"
//! auth_method = "api-key"
//! api_key = "${SONIC_LAB_API_KEY}"
//! auto_sync = true
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, Environment, HttpConfig, IntegrationDefinition, LoggingConfig,
    MedSyncConfig, OAuthConfig, RetryConfig, StorageConfig, SyncConfig,
};
pub use secret::{fingerprint, secret_string, secret_string_opt, SecretString, SecretValue};
