//! Well-known phase names.
//!
//! Phases are open strings; plugins may register handlers for any custom
//! phase and run it with [`Middleware::run`](crate::Middleware::run).

/// Before the outgoing request is finalized.
pub const REQUEST: &str = "request";

/// After the request is built, right before the network call. Transport
/// decorators are installed here.
pub const BEFORE_DIAL: &str = "before dial";

/// After a response was received.
pub const RESPONSE: &str = "response";

/// After any other phase left an error on the context.
pub const ERROR: &str = "error";

/// Context key holding the phase a stack is currently running.
pub const PHASE_KEY: &str = "$phase";
