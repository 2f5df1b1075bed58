//! Built-in plugins.
//!
//! Most of them are plain [`HandlerPlugin`](tether_core::HandlerPlugin)s
//! running in the `request` phase. [`Timeout`](timeout::Timeout) decorates
//! the transport in `before dial` and [`Logger`](logger::Logger) observes
//! several phases.

pub mod auth;
pub mod body;
pub mod cookies;
pub mod headers;
pub mod logger;
pub mod query;
pub mod timeout;
pub mod transport;
pub mod url;

pub use logger::Logger;
pub use timeout::Timeout;
