//! Per-request timeout as a transport decorator.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    Context, Control, Error, HttpRequest, HttpResponse, Plugin, PluginState, Result, Transport,
    TransportHandle, phase,
};

/// Fails a round trip with [`Error::Timeout`] once `limit` has elapsed.
///
/// The limit covers every attempt made by decorators installed before it,
/// so a [`Retry`](crate::retry::Retry) registered first is bounded as a
/// whole.
pub struct TimeoutTransport {
    limit: Duration,
    inner: Arc<dyn Transport>,
    handle: TransportHandle,
}

impl TimeoutTransport {
    pub fn new(limit: Duration, inner: Arc<dyn Transport>, handle: TransportHandle) -> Self {
        Self {
            limit,
            inner,
            handle,
        }
    }
}

#[async_trait]
impl Transport for TimeoutTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        let _restore = self.handle.restore_guard();
        tokio::time::timeout(self.limit, self.inner.round_trip(request))
            .await
            .map_err(|elapsed| Error::Timeout(Arc::new(elapsed)))?
    }
}

/// Plugin bounding the network round trip.
#[derive(Debug)]
pub struct Timeout {
    limit: Duration,
    state: PluginState,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            state: PluginState::new(),
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl Plugin for Timeout {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        if phase == phase::BEFORE_DIAL {
            let handle = ctx.transport_handle().clone();
            let limit = self.limit;
            ctx.transport_handle()
                .decorate(|inner| Arc::new(TimeoutTransport::new(limit, inner, handle)));
        }
        Control::Next
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        "timeout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode, Uri};

    struct Slow(Duration);

    #[async_trait]
    impl Transport for Slow {
        async fn round_trip(&self, _request: HttpRequest) -> Result<HttpResponse> {
            tokio::time::sleep(self.0).await;
            Ok(HttpResponse::new(StatusCode::OK))
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::new(Method::GET, Uri::from_static("http://example.com/"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let inner: Arc<dyn Transport> = Arc::new(Slow(Duration::from_secs(10)));
        let handle = TransportHandle::new(inner.clone());
        let transport = TimeoutTransport::new(Duration::from_secs(1), inner, handle);
        let err = transport.round_trip(request()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_limit() {
        let inner: Arc<dyn Transport> = Arc::new(Slow(Duration::from_millis(10)));
        let handle = TransportHandle::new(inner.clone());
        let transport = TimeoutTransport::new(Duration::from_secs(1), inner, handle);
        let res = transport.round_trip(request()).await.unwrap();
        assert_eq!(res.status, StatusCode::OK);
    }

    #[test]
    fn test_plugin_decorates_and_restores() {
        let mut ctx = Context::with_transport(Arc::new(Slow(Duration::ZERO)));
        Timeout::new(Duration::from_secs(1)).exec(phase::BEFORE_DIAL, &mut ctx);
        assert!(ctx.transport_handle().is_decorated());
        ctx.transport_handle().restore();
        assert!(!ctx.transport_handle().is_decorated());
    }
}
