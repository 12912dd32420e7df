//! OAuth command implementation
//!
//! Drives the authorization-code handshake from the terminal: `begin`
//! prints the URL to open in a browser, `complete` takes the `code` and
//! `state` query parameters the provider redirected back with.

use super::{open_service, parse_id, report};
use clap::{Args, Subcommand};
use tokio::sync::watch;

/// Arguments for the oauth command
#[derive(Args, Debug)]
pub struct OAuthArgs {
    #[command(subcommand)]
    pub command: OAuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum OAuthCommand {
    /// Start authorization and print the provider URL
    Begin {
        /// Integration to authorize
        id: String,

        /// Overrides the redirect URI stored on the integration
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Exchange the authorization code returned by the provider
    Complete {
        /// Integration being authorized
        id: String,

        /// `code` query parameter of the callback
        #[arg(long)]
        code: String,

        /// `state` query parameter of the callback
        #[arg(long)]
        state: String,
    },
}

impl OAuthArgs {
    /// Execute the oauth command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let service = match open_service(config_path, shutdown_signal).await {
            Ok(service) => service,
            Err(code) => return Ok(code),
        };

        match &self.command {
            OAuthCommand::Begin { id, redirect_uri } => {
                let id = match parse_id(id) {
                    Ok(id) => id,
                    Err(code) => return Ok(code),
                };
                match service.begin_oauth(&id, redirect_uri.as_deref()).await {
                    Ok(url) => {
                        println!("🔐 Open this URL to authorize {id}:");
                        println!();
                        println!("{url}");
                        println!();
                        println!("Then run: medsync oauth complete {id} --code <CODE> --state <STATE>");
                        Ok(0)
                    }
                    Err(e) => Ok(report(&e)),
                }
            }
            OAuthCommand::Complete { id, code, state } => {
                let id = match parse_id(id) {
                    Ok(id) => id,
                    Err(code) => return Ok(code),
                };
                match service.complete_oauth(&id, code, state).await {
                    Ok(()) => {
                        println!("✅ Authorization complete for {id}");
                        Ok(0)
                    }
                    Err(e) => Ok(report(&e)),
                }
            }
        }
    }
}
