//! HTTP plumbing shared by the auth adapter and the provider strategies

pub mod retry;
pub mod transport;

pub use retry::RetryPolicy;
pub use transport::{send_json, HttpTransport};
