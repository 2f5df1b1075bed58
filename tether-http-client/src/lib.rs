//! # Tether HTTP Client
//!
//! HTTP client built on the `tether-core` middleware pipeline, with a
//! reqwest transport, retry and redirect decorators, and a set of
//! request-shaping plugins.
//!
//! ## Features
//!
//! - **Plugins everywhere**: every builder call registers a plugin, so
//!   client-level and request-level behavior compose in one pipeline
//! - **Retry with Backoff**: constant, exponential and logarithmic schedules
//! - **Redirects**: followed hop by hop, with sensitive headers stripped
//! - **Timeouts**: per-client connection settings and per-request limits
//! - **Compression**: Automatic gzip/brotli support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether_http_client::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::default())?;
//!
//!     let response = client
//!         .get("https://api.example.com/users")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## With Retry and a Base URL
//!
//! ```rust,no_run
//! use tether_http_client::{Client, ClientConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://api.example.com/v1/")
//!         .timeout(Duration::from_secs(30))
//!         .retry(RetryPolicy::exponential(3, Duration::from_millis(100)))
//!         .build();
//!
//!     let client = Client::new(config)?;
//!
//!     // Server errors are retried before the response comes back
//!     let response = client
//!         .post("orders")
//!         .json(&serde_json::json!({"item": "widget", "quantity": 5}))
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```

pub mod backoff;
mod client;
mod config;
pub mod plugins;
pub mod redirect;
mod request;
mod response;
pub mod retry;
mod transport;

/// Default `User-Agent` header value.
pub const USER_AGENT: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use redirect::{Redirect, RedirectOptions};
pub use request::Request;
pub use response::Response;
pub use retry::{Retry, RetryPolicy};
pub use transport::ReqwestTransport;

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use tether_core::{Error, Result};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use tether_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::config::{ClientConfig, ClientConfigBuilder};
    pub use crate::plugins::{Logger, Timeout};
    pub use crate::redirect::Redirect;
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::retry::{Retry, RetryPolicy};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
    pub use tether_core::{Context, Control, Error, Plugin, Result};
}
