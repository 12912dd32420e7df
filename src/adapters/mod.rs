//! Outbound edges of the sync engine
//!
//! - [`http`] - client construction, JSON send helper and retry policy
//! - [`auth`] - per-method authentication (`AuthAdapter`)
//! - [`providers`] - one sync strategy per integration type
//! - [`store`] - persistence collaborators for integrations, logs and records
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind traits so the core can be tested
//! against in-memory implementations and mocked provider endpoints.
//!
//! ```rust,no_run
//! use medsync::adapters::auth::AuthAdapter;
//! use medsync::adapters::http::HttpTransport;
//! use medsync::config::HttpConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&HttpConfig::default())?;
//! let auth = AuthAdapter::new(transport, chrono::Duration::seconds(60));
//! # let _ = auth;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod http;
pub mod providers;
pub mod store;
