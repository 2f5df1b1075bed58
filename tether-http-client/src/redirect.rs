//! Redirect following as a transport decorator.
//!
//! The underlying reqwest client never follows redirects itself. The
//! [`Redirect`] plugin wraps the transport during `before dial` and follows
//! `Location` headers hop by hop, so every hop goes through the same inner
//! transport (retries included).

use async_trait::async_trait;
use http::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderName, LOCATION,
    PROXY_AUTHORIZATION, WWW_AUTHENTICATE,
};
use http::{Method, StatusCode, Uri};
use std::sync::Arc;
use tether_core::{
    Context, Control, Error, HttpRequest, HttpResponse, Plugin, PluginState, Result, Transport,
    TransportHandle, phase,
};
use tracing::{debug, warn};

/// Default maximum number of redirects.
pub const DEFAULT_LIMIT: usize = 10;

/// Headers dropped on redirect unless the target is trusted.
pub fn default_sensitive_headers() -> Vec<HeaderName> {
    vec![AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE, WWW_AUTHENTICATE]
}

/// Redirect policy.
#[derive(Debug, Clone)]
pub struct RedirectOptions {
    /// Redirects to follow before failing.
    pub limit: usize,
    /// Keep sensitive headers on every hop.
    pub trusted: bool,
    pub sensitive_headers: Vec<HeaderName>,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            trusted: false,
            sensitive_headers: default_sensitive_headers(),
        }
    }
}

fn is_followed(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn resolve(base: &Uri, location: &str) -> Result<Uri> {
    let base = url::Url::parse(&base.to_string())?;
    let next = base.join(location)?;
    Uri::try_from(next.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))
}

/// Build the request for the next hop.
fn next_request(
    options: &RedirectOptions,
    previous: &HttpRequest,
    status: StatusCode,
    location: &str,
) -> Result<HttpRequest> {
    let uri = resolve(&previous.uri, location)?;
    let keep_body = matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    );
    let method = if keep_body || previous.method == Method::HEAD {
        previous.method.clone()
    } else {
        Method::GET
    };

    let mut next = HttpRequest::new(method, uri);
    next.headers = previous.headers.clone();
    if keep_body {
        next.body = previous.body.clone();
    } else {
        next.headers.remove(CONTENT_TYPE);
        next.headers.remove(CONTENT_LENGTH);
    }
    if !options.trusted {
        for name in &options.sensitive_headers {
            next.headers.remove(name);
        }
    }
    Ok(next)
}

/// Transport following redirects through an inner transport.
pub struct RedirectTransport {
    options: RedirectOptions,
    inner: Arc<dyn Transport>,
    handle: TransportHandle,
}

impl RedirectTransport {
    pub fn new(
        options: RedirectOptions,
        inner: Arc<dyn Transport>,
        handle: TransportHandle,
    ) -> Self {
        Self {
            options,
            inner,
            handle,
        }
    }
}

#[async_trait]
impl Transport for RedirectTransport {
    async fn round_trip(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let _restore = self.handle.restore_guard();
        // 307 and 308 replay the body.
        request.body.buffer().await?;

        let mut hops = 0;
        loop {
            let res = self.inner.round_trip(request.clone()).await?;
            if !is_followed(res.status) {
                return Ok(res);
            }
            let Some(location) = res.header(LOCATION) else {
                return Ok(res);
            };
            if hops >= self.options.limit {
                warn!(limit = self.options.limit, "Redirect limit exceeded");
                return Err(Error::RedirectLimitExceeded(self.options.limit));
            }
            hops += 1;

            request = next_request(&self.options, &request, res.status, location)?;
            debug!(
                hop = hops,
                status = %res.status,
                method = %request.method,
                uri = %request.uri,
                "Following redirect"
            );
        }
    }
}

/// Plugin following redirects according to [`RedirectOptions`].
#[derive(Debug, Default)]
pub struct Redirect {
    options: RedirectOptions,
    state: PluginState,
}

impl Redirect {
    pub fn new(options: RedirectOptions) -> Self {
        Self {
            options,
            state: PluginState::new(),
        }
    }

    /// Follow at most `limit` redirects.
    pub fn limit(limit: usize) -> Self {
        Self::new(RedirectOptions {
            limit,
            ..Default::default()
        })
    }

    /// Keep sensitive headers across hops.
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.options.trusted = trusted;
        self
    }

    pub fn sensitive_headers(mut self, headers: Vec<HeaderName>) -> Self {
        self.options.sensitive_headers = headers;
        self
    }

    pub fn options(&self) -> &RedirectOptions {
        &self.options
    }
}

impl Plugin for Redirect {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        if phase == phase::BEFORE_DIAL {
            let handle = ctx.transport_handle().clone();
            let options = self.options.clone();
            ctx.transport_handle()
                .decorate(|inner| Arc::new(RedirectTransport::new(options, inner, handle)));
        }
        Control::Next
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        "redirect"
    }
}
