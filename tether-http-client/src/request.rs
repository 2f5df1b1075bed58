//! Request builder.
//!
//! Every builder method registers a plugin instead of touching the request
//! directly, so the request is only assembled when it is sent (or dumped),
//! after the client-level plugins ran.

use crate::client::Client;
use crate::plugins::{self, Timeout};
use crate::redirect::Redirect;
use crate::response::Response;
use crate::retry::{Retry, RetryPolicy};
use crate::transport::ReqwestTransport;
use bytes::Bytes;
use futures::Stream;
use http::header::{HeaderValue, USER_AGENT};
use http::Method;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tether_core::plugin::on_request;
use tether_core::{
    Context, Control, Error, Middleware, Mux, Plugin, Result, Transport, dispatch,
    dispatch_until_dial, wire,
};

/// HTTP request with its own context and middleware stack.
///
/// A request created from a [`Client`] inherits the client's context values
/// and plugins. A request can be sent once; [`Clone`] it to send it again.
pub struct Request {
    context: Context,
    middleware: Middleware,
    dispatched: bool,
}

impl Request {
    /// Create a standalone request using the shared default transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::default()))
    }

    /// Create a standalone request sent through `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let mut context = Context::with_transport(transport);
        context
            .request
            .headers
            .insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        Self {
            context,
            middleware: Middleware::new(),
            dispatched: false,
        }
    }

    pub(crate) fn from_client(client: &Client) -> Self {
        let mut request = Self::with_transport(client.transport());
        request.context.use_parent(client.shared_context());
        request.middleware.use_parent(client.shared_middleware());
        request
    }

    fn with_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.middleware.use_plugin(plugin);
        self
    }

    /// Set the HTTP method.
    pub fn method(self, method: Method) -> Self {
        self.with_plugin(
            on_request(move |ctx| {
                ctx.request.method = method.clone();
                Control::Next
            })
            .named("method"),
        )
    }

    /// Set the URL. A relative URL is resolved against the base URL.
    pub fn url(self, url: impl Into<String>) -> Self {
        self.with_plugin(plugins::url::url(url))
    }

    /// Use the scheme, host and path of `url`.
    pub fn base_url(self, url: impl Into<String>) -> Self {
        self.with_plugin(plugins::url::base_url(url))
    }

    /// Replace the URL path.
    pub fn path(self, path: impl Into<String>) -> Self {
        self.with_plugin(plugins::url::path(path))
    }

    /// Append a segment to the URL path.
    pub fn add_path(self, segment: impl Into<String>) -> Self {
        self.with_plugin(plugins::url::add_path(segment))
    }

    /// Replace the `:name` placeholder in the path.
    pub fn param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::url::param(name, value))
    }

    /// Replace several path placeholders.
    pub fn params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_plugin(plugins::url::params(params))
    }

    /// Set a query parameter, replacing existing values.
    pub fn set_query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::query::set(key, value))
    }

    /// Add a query parameter value.
    pub fn add_query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::query::add(key, value))
    }

    /// Set several query parameters.
    pub fn set_query_params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_plugin(plugins::query::set_map(params))
    }

    /// Set a header, replacing existing values.
    pub fn set_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::headers::set(name, value))
    }

    /// Add a header value.
    pub fn add_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::headers::add(name, value))
    }

    /// Set several headers.
    pub fn set_headers<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_plugin(plugins::headers::set_map(fields))
    }

    /// Set the content type from a MIME type or an alias such as `json`.
    pub fn content_type(self, alias: impl Into<String>) -> Self {
        self.with_plugin(plugins::body::content_type(alias))
    }

    /// Set a raw body.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.with_plugin(plugins::body::bytes(body))
    }

    /// Set a text body. The content type is left alone.
    pub fn body_string(self, body: impl Into<String>) -> Self {
        self.with_plugin(plugins::body::string(body))
    }

    /// Set a streaming body.
    pub fn body_stream<S>(self, stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.with_plugin(plugins::body::stream(stream))
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.with_plugin(plugins::body::json(value))
    }

    /// Set a URL-encoded form body.
    pub fn form<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.with_plugin(plugins::body::form(value))
    }

    /// Add a cookie without replacing the ones already set.
    pub fn add_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_plugin(plugins::cookies::add(name, value))
    }

    /// Add several cookies without replacing the ones already set.
    pub fn add_cookies<I, K, V>(self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_plugin(plugins::cookies::add_multiple(cookies))
    }

    /// Set bearer authentication.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        self.with_plugin(plugins::auth::bearer(token))
    }

    /// Set basic authentication.
    pub fn basic_auth(self, username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        self.with_plugin(plugins::auth::basic(username, password))
    }

    /// Bound the network round trip.
    pub fn timeout(self, limit: Duration) -> Self {
        self.with_plugin(Timeout::new(limit))
    }

    /// Retry the round trip with `policy`.
    pub fn retry(self, policy: RetryPolicy) -> Self {
        self.with_plugin(Retry::new(policy))
    }

    /// Follow up to `limit` redirects.
    pub fn follow_redirects(self, limit: usize) -> Self {
        self.with_plugin(Redirect::limit(limit))
    }

    /// Send through `transport` instead of the inherited one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.context.set_transport(transport);
        self
    }

    /// Append a plugin.
    pub fn use_plugin<P: Plugin + 'static>(self, plugin: P) -> Self {
        self.with_plugin(plugin)
    }

    /// Append a shared plugin.
    pub fn use_shared(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.middleware.use_shared(plugin);
        self
    }

    /// Add a handler for `phase`.
    pub fn use_handler<F>(mut self, phase: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_handler(phase, handler);
        self
    }

    /// Add a `request` phase handler.
    pub fn use_request<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_request(handler);
        self
    }

    /// Add a `response` phase handler.
    pub fn use_response<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_response(handler);
        self
    }

    /// Add an `error` phase handler.
    pub fn use_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Control + Send + Sync + 'static,
    {
        self.middleware.use_error(handler);
        self
    }

    /// Add a multiplexer configured by `configure`.
    ///
    /// ```
    /// use tether_core::mux::matchers;
    /// use tether_http_client::Request;
    ///
    /// let request = Request::new()
    ///     .url("http://localhost/items")
    ///     .mux(|mux| {
    ///         mux.add_matcher(matchers::server_error());
    ///         mux.use_response(|ctx| {
    ///             ctx.set("degraded", true);
    ///             tether_core::Control::Next
    ///         });
    ///     });
    /// # let _ = request;
    /// ```
    pub fn mux<F>(self, configure: F) -> Self
    where
        F: FnOnce(&mut Mux),
    {
        let mut mux = Mux::new();
        configure(&mut mux);
        self.with_plugin(mux)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut Middleware {
        &mut self.middleware
    }

    /// Check if [`send`](Self::send) was already called.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Run the pipeline and perform the request.
    ///
    /// Fails with [`Error::AlreadyDispatched`] on a second call, without
    /// running anything.
    pub async fn send(&mut self) -> Result<Response> {
        if self.dispatched {
            return Err(Error::AlreadyDispatched);
        }
        self.dispatched = true;

        let raw = dispatch(&self.middleware, &mut self.context).await?;
        Ok(Response::new(raw, self.context.request.clone()))
    }

    /// HTTP/1.1 wire representation of the request.
    ///
    /// The `request` and `before dial` phases run on a clone, so the request
    /// itself is left untouched. A streaming body is buffered when `body` is
    /// set, which consumes the stream shared with this request.
    pub async fn dump(&self, body: bool) -> Result<String> {
        let mut tmp = self.clone();
        dispatch_until_dial(&tmp.middleware, &mut tmp.context)?;
        wire::dump_request(&mut tmp.context.request, body).await
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Request {
    /// Independent copy that has not been dispatched yet.
    ///
    /// The outcome of a previous send is not carried over.
    fn clone(&self) -> Self {
        let mut context = self.context.clone();
        context.response = None;
        context.error = None;
        Self {
            context,
            middleware: self.middleware.clone(),
            dispatched: false,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("context", &self.context)
            .field("middleware", &self.middleware)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::StatusCode;
    use parking_lot::Mutex;
    use tether_core::{HttpRequest, HttpResponse};

    /// Records requests and answers 200 with the request path.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
            let path = request.path().to_string();
            self.seen.lock().push(request);
            Ok(HttpResponse::new(StatusCode::OK).with_body(path))
        }
    }

    fn request(recorder: &Arc<Recorder>) -> Request {
        Request::with_transport(recorder.clone())
    }

    #[tokio::test]
    async fn test_builder_assembles_request() {
        let recorder = Arc::new(Recorder::default());
        let mut req = request(&recorder)
            .method(Method::POST)
            .url("http://example.com/users/:id")
            .param("id", "7")
            .set_query("expand", "true")
            .set_header("X-Trace", "abc")
            .json(&serde_json::json!({"active": true}));

        let res = req.send().await.unwrap();
        assert_eq!(res.text().unwrap(), "/users/7");
        assert_eq!(res.url().query(), Some("expand=true"));

        let seen = recorder.seen.lock();
        let sent = &seen[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.header("x-trace"), Some("abc"));
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert_eq!(sent.header("user-agent"), Some(crate::USER_AGENT));
    }

    #[tokio::test]
    async fn test_cookies_are_folded_into_one_header() {
        let recorder = Arc::new(Recorder::default());
        let mut req = request(&recorder)
            .url("http://example.com/")
            .add_cookie("foo", "bar")
            .add_cookies([("theme", "dark"), ("lang", "en")]);
        req.send().await.unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen[0].header("cookie"), Some("foo=bar; theme=dark; lang=en"));
    }

    #[tokio::test]
    async fn test_send_twice_fails() {
        let recorder = Arc::new(Recorder::default());
        let mut req = request(&recorder).url("http://example.com/");
        req.send().await.unwrap();
        assert!(req.is_dispatched());

        let err = req.send().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyDispatched));
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_clone_is_independent() {
        let recorder = Arc::new(Recorder::default());
        let mut original = request(&recorder).url("http://example.com/a");
        original.send().await.unwrap();

        let mut copy = original.clone().path("/b");
        assert!(!copy.is_dispatched());
        let res = copy.send().await.unwrap();
        assert_eq!(res.text().unwrap(), "/b");
        assert_eq!(original.middleware().len(), 1);
    }

    #[tokio::test]
    async fn test_clone_after_short_circuit_retries_once_per_attempt() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use tether_core::phase;

        #[derive(Default)]
        struct Unavailable {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Transport for Unavailable {
            async fn round_trip(&self, _request: HttpRequest) -> Result<HttpResponse> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE))
            }
        }

        let transport = Arc::new(Unavailable::default());
        let served = Arc::new(AtomicBool::new(false));
        let flag = served.clone();
        let mut original = Request::with_transport(transport.clone())
            .url("http://example.com/")
            .retry(crate::retry::RetryPolicy::constant(2, Duration::from_millis(1)))
            .use_handler(phase::BEFORE_DIAL, move |ctx| {
                if !flag.swap(true, Ordering::SeqCst) {
                    ctx.set_response(HttpResponse::new(StatusCode::OK));
                    return Control::Stop;
                }
                Control::Next
            });

        let res = original.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!original.context().transport_handle().is_decorated());

        let res = original.clone().send().await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(!original.context().transport_handle().is_decorated());
    }

    #[tokio::test]
    async fn test_dump_leaves_request_untouched() {
        let recorder = Arc::new(Recorder::default());
        let req = request(&recorder)
            .method(Method::PUT)
            .url("http://example.com/items?id=1")
            .content_type("text")
            .body_string("hello");

        let dump = req.dump(true).await.unwrap();
        assert!(dump.starts_with("PUT /items?id=1 HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(dump.contains("Content-Type: text/plain\r\n"));
        assert!(dump.ends_with("\r\n\r\nhello"));

        assert!(!req.is_dispatched());
        assert_eq!(req.context().request.method, Method::GET);
        assert!(recorder.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_short_circuit_response() {
        let recorder = Arc::new(Recorder::default());
        let mut req = request(&recorder).url("http://example.com/").use_request(|ctx| {
            ctx.set_response(HttpResponse::new(StatusCode::NOT_MODIFIED));
            Control::Stop
        });
        let res = req.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
        assert!(recorder.seen.lock().is_empty());
    }
}
