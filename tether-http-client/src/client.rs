//! HTTP client implementation.

use crate::config::ClientConfig;
use crate::plugins;
use crate::redirect::Redirect;
use crate::request::Request;
use crate::retry::Retry;
use crate::transport::ReqwestTransport;
use http::Method;
use std::sync::Arc;
use tether_core::{Context, Control, KeyLike, Middleware, Plugin, Result, Transport};
use tracing::debug;

/// HTTP client holding the parent context and middleware of its requests.
///
/// Clones share the transport. Adding plugins or values to a clone, or to a
/// client with live requests, copies the shared state first, so requests
/// already created keep what they were created with.
#[derive(Clone)]
pub struct Client {
    context: Arc<Context>,
    middleware: Arc<Middleware>,
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client sending through `transport`.
    ///
    /// Connection settings of `config` are ignored; they only apply to the
    /// reqwest transport built by [`Client::new`].
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let middleware = Self::configure(&config);
        debug!(
            plugins = middleware.len(),
            base_url = ?config.base_url,
            "Created HTTP client"
        );
        Self {
            context: Arc::new(Context::new()),
            middleware: Arc::new(middleware),
            transport,
            config: Arc::new(config),
        }
    }

    /// Plugins derived from the configuration.
    ///
    /// Retry is registered before redirect so every hop gets retried.
    fn configure(config: &ClientConfig) -> Middleware {
        let mut middleware = Middleware::new();
        if let Some(base_url) = &config.base_url {
            middleware.use_plugin(plugins::url::base_url(base_url.clone()));
        }
        middleware.use_plugin(plugins::headers::set(
            http::header::USER_AGENT.as_str(),
            config.user_agent.clone(),
        ));
        if !config.default_headers.is_empty() {
            middleware.use_plugin(plugins::headers::set_map(config.default_headers.clone()));
        }
        if let Some(policy) = &config.retry {
            middleware.use_plugin(Retry::new(policy.clone()));
        }
        if config.follow_redirects {
            middleware.use_plugin(Redirect::limit(config.max_redirects));
        }
        middleware
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Transport used by new requests.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = transport;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    pub(crate) fn shared_context(&self) -> Arc<Context> {
        self.context.clone()
    }

    pub(crate) fn shared_middleware(&self) -> Arc<Middleware> {
        self.middleware.clone()
    }

    /// Store a value visible to every request created afterwards.
    pub fn set<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: KeyLike,
        V: std::any::Any + Send + Sync,
    {
        Arc::make_mut(&mut self.context).set(key, value);
        self
    }

    /// Append a plugin to the client stack.
    pub fn use_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        Arc::make_mut(&mut self.middleware).use_plugin(plugin);
        self
    }

    /// Append a shared plugin to the client stack.
    pub fn use_shared(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        Arc::make_mut(&mut self.middleware).use_shared(plugin);
        self
    }

    /// Add a handler for `phase`.
    pub fn use_handler<F>(&mut self, phase: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.middleware).use_handler(phase, handler);
        self
    }

    /// Add a `request` phase handler.
    pub fn use_request<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.middleware).use_request(handler);
        self
    }

    /// Add a `response` phase handler.
    pub fn use_response<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.middleware).use_response(handler);
        self
    }

    /// Add an `error` phase handler.
    pub fn use_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.middleware).use_error(handler);
        self
    }

    /// Create a request inheriting this client's context and plugins.
    pub fn new_request(&self) -> Request {
        Request::from_client(self)
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> Request {
        self.request(Method::GET, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> Request {
        self.request(Method::POST, url)
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> Request {
        self.request(Method::PUT, url)
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> Request {
        self.request(Method::PATCH, url)
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: impl Into<String>) -> Request {
        self.request(Method::DELETE, url)
    }

    /// Create a HEAD request builder.
    pub fn head(&self, url: impl Into<String>) -> Request {
        self.request(Method::HEAD, url)
    }

    /// Create a request builder with a custom method.
    ///
    /// A relative `url` is resolved against the configured base URL.
    pub fn request(&self, method: Method, url: impl Into<String>) -> Request {
        let url = url.into();
        let request = self.new_request().method(method);
        if url.is_empty() {
            request
        } else {
            request.url(url)
        }
    }
}

impl Default for Client {
    /// Client with the default configuration over the shared reqwest client.
    fn default() -> Self {
        Self::with_transport(
            ClientConfig::default(),
            Arc::new(ReqwestTransport::default()),
        )
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("middleware", &self.middleware)
            .finish()
    }
}
