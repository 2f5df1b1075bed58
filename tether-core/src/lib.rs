// Core engine for the Tether HTTP client
// Context, plugin protocol, middleware stacks and phase dispatch. Nothing in
// here talks to the network; transports plug in through the `Transport` trait.

pub mod body;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod message;
pub mod middleware;
pub mod mux;
pub mod phase;
pub mod plugin;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use body::Body;
pub use context::{Context, Key, KeyLike, Value};
pub use dispatcher::{dispatch, dispatch_until_dial};
pub use error::{BoxError, Error, Result};
pub use message::{HttpRequest, HttpResponse};
pub use middleware::{Middleware, Outcome};
pub use mux::{Matcher, Mux, matchers};
pub use plugin::{Control, Handler, HandlerPlugin, Plugin, PluginState};
pub use transport::{NoTransport, RestoreGuard, Transport, TransportHandle};

// HTTP types used throughout the public API
pub use http::{HeaderMap, Method, StatusCode, Uri};
