//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for MedSync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// MedSync - Healthcare Integration Sync Engine
#[derive(Parser, Debug)]
#[command(name = "medsync")]
#[command(version, about, long_about = None)]
#[command(author = "MedSync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "medsync.toml", env = "MEDSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MEDSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync one integration, or all auto-sync integrations
    Sync(commands::sync::SyncArgs),

    /// Test connectivity and credentials of an integration
    Test(commands::test::TestArgs),

    /// Run the OAuth authorization handshake
    #[command(name = "oauth")]
    OAuth(commands::oauth::OAuthArgs),

    /// Show recent sync log entries
    Logs(commands::logs::LogsArgs),

    /// Manage registered integrations
    Integrations(commands::integrations::IntegrationsArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
