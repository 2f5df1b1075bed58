// Tether - A composable HTTP client toolkit for Rust
//
// Requests flow through named phases (request, before dial, response, error)
// and independently written plugins attach behavior to any of them.

// Re-export the pipeline engine
pub use tether_core::*;

// Re-export the reqwest-backed client
#[cfg(feature = "client")]
pub use tether_http_client as client;

#[cfg(feature = "client")]
pub use tether_http_client::{
    Client, ClientConfig, ClientConfigBuilder, Redirect, RedirectOptions, ReqwestTransport,
    Request, Response, Retry, RetryPolicy, plugins,
};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Context,
        Control,
        Error,
        HandlerPlugin,
        HttpRequest,
        HttpResponse,
        Middleware,
        Mux,
        Plugin,
        Result,
        Transport,
        matchers,
        phase,
    };

    #[cfg(feature = "client")]
    pub use crate::{Client, ClientConfig, Request, Response, Retry, RetryPolicy};
}
