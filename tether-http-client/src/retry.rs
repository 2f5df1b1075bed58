//! Retry policy and the retrying transport decorator.

use crate::backoff;
use async_trait::async_trait;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    Body, Context, Control, Error, HttpRequest, HttpResponse, Plugin, PluginState, Result,
    Transport, TransportHandle, phase,
};
use tracing::{debug, warn};

/// Default number of retries.
pub const RETRY_TIMES: usize = 3;

/// Default wait between attempts.
pub const RETRY_WAIT: Duration = Duration::from_millis(500);

/// Waits between attempts, one per retry.
///
/// A policy of length `n` allows up to `n + 1` attempts in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    waits: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::constant(RETRY_TIMES, RETRY_WAIT)
    }
}

impl RetryPolicy {
    /// Create a policy from an explicit schedule.
    pub fn new(waits: Vec<Duration>) -> Self {
        Self { waits }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Retry `retries` times with the same wait.
    pub fn constant(retries: usize, wait: Duration) -> Self {
        Self::new(backoff::constant(retries, wait))
    }

    /// Retry `retries` times, doubling the wait each time.
    pub fn exponential(retries: usize, initial: Duration) -> Self {
        Self::new(backoff::exponential(retries, initial))
    }

    /// Retry `retries` times with logarithmically growing waits.
    pub fn logarithmic(retries: usize, initial: Duration) -> Self {
        Self::new(backoff::logarithmic(retries, initial))
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Number of retries after the first attempt.
    pub fn retries(&self) -> usize {
        self.waits.len()
    }

    /// Total attempts allowed, the first one included.
    pub fn max_attempts(&self) -> usize {
        self.waits.len() + 1
    }
}

/// Decides whether an attempt failed.
///
/// Returns `Ok(())` for success, or the cause of the failure, which triggers
/// another attempt while the policy allows it.
pub type Evaluator =
    Arc<dyn Fn(&Result<HttpResponse>, &HttpRequest) -> Result<()> + Send + Sync>;

/// Treats transport errors, 5xx and 429 responses as failures.
pub fn default_evaluator() -> Evaluator {
    Arc::new(evaluate)
}

fn evaluate(result: &Result<HttpResponse>, _request: &HttpRequest) -> Result<()> {
    match result {
        Err(error) => Err(error.clone()),
        Ok(res)
            if res.status.is_server_error() || res.status == StatusCode::TOO_MANY_REQUESTS =>
        {
            Err(Error::Server(res.status))
        }
        Ok(_) => Ok(()),
    }
}

/// Transport that replays a request until the evaluator accepts the outcome.
///
/// The body is buffered once before the first attempt and every attempt gets
/// its own copy. When the call ends the owning context goes back to its
/// undecorated transport.
pub struct RetryTransport {
    policy: RetryPolicy,
    evaluator: Evaluator,
    inner: Arc<dyn Transport>,
    handle: TransportHandle,
}

impl RetryTransport {
    pub fn new(
        policy: RetryPolicy,
        evaluator: Evaluator,
        inner: Arc<dyn Transport>,
        handle: TransportHandle,
    ) -> Self {
        Self {
            policy,
            evaluator,
            inner,
            handle,
        }
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn round_trip(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let _restore = self.handle.restore_guard();
        let body = request.body.buffer().await?;

        let max_attempts = self.policy.max_attempts();
        let mut waits = self.policy.waits().iter();
        let mut attempt = 1;
        loop {
            let mut copy = request.clone();
            copy.body = Body::from(body.clone());

            let result = self.inner.round_trip(copy).await;
            let cause = match (self.evaluator)(&result, &request) {
                Ok(()) => return result,
                Err(cause) => cause,
            };

            let Some(wait) = waits.next() else {
                warn!(attempts = attempt, cause = %cause, "Retry policy exhausted");
                return result;
            };
            debug!(
                attempt,
                max_attempts,
                wait_ms = wait.as_millis() as u64,
                cause = %cause,
                "Retrying request"
            );
            tokio::time::sleep(*wait).await;
            attempt += 1;
        }
    }
}

impl fmt::Debug for RetryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("policy", &self.policy)
            .finish()
    }
}

/// Wrap the context's transport with a [`RetryTransport`].
pub fn intercept_transport(ctx: &Context, policy: RetryPolicy, evaluator: Evaluator) {
    let handle = ctx.transport_handle().clone();
    ctx.transport_handle().decorate(|inner| {
        Arc::new(RetryTransport::new(policy, evaluator, inner, handle))
    });
}

/// Plugin installing a [`RetryTransport`] right before dialing.
///
/// ```
/// use std::time::Duration;
/// use tether_http_client::retry::{Retry, RetryPolicy};
///
/// let retry = Retry::new(RetryPolicy::exponential(4, Duration::from_millis(100)));
/// # let _ = retry;
/// ```
pub struct Retry {
    policy: RetryPolicy,
    evaluator: Evaluator,
    state: PluginState,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            evaluator: default_evaluator(),
            state: PluginState::new(),
        }
    }

    /// Use a custom failure evaluator.
    pub fn with_evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&Result<HttpResponse>, &HttpRequest) -> Result<()> + Send + Sync + 'static,
    {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn disable(&self) {
        self.state.disable();
    }

    pub fn enable(&self) {
        self.state.enable();
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Plugin for Retry {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        if phase == phase::BEFORE_DIAL {
            intercept_transport(ctx, self.policy.clone(), self.evaluator.clone());
        }
        Control::Next
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        "retry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use parking_lot::Mutex;
    use std::io;

    /// Replays scripted outcomes and records every body it receives.
    struct Scripted {
        outcomes: Mutex<Vec<Result<HttpResponse>>>,
        bodies: Mutex<Vec<Bytes>>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<HttpResponse>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.bodies.lock().len()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
            let body = request.body.collect().await?;
            self.bodies.lock().push(body);
            self.outcomes
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse::new(StatusCode::OK)))
        }
    }

    fn status(code: StatusCode) -> Result<HttpResponse> {
        Ok(HttpResponse::new(code))
    }

    fn decorated(inner: Arc<Scripted>, policy: RetryPolicy) -> (TransportHandle, RetryTransport) {
        let handle = TransportHandle::new(inner.clone());
        let retry = RetryTransport::new(policy, default_evaluator(), inner, handle.clone());
        (handle, retry)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries(), 3);
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.waits().iter().all(|w| *w == RETRY_WAIT));
    }

    #[test]
    fn test_default_evaluator() {
        let req = HttpRequest::default();
        assert!(evaluate(&status(StatusCode::OK), &req).is_ok());
        assert!(evaluate(&status(StatusCode::NOT_FOUND), &req).is_ok());
        assert!(matches!(
            evaluate(&status(StatusCode::TOO_MANY_REQUESTS), &req),
            Err(Error::Server(StatusCode::TOO_MANY_REQUESTS))
        ));
        assert!(matches!(
            evaluate(&status(StatusCode::BAD_GATEWAY), &req),
            Err(Error::Server(_))
        ));
        assert!(evaluate(&Err(Error::msg("reset")), &req).is_err());
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let inner = Scripted::new(vec![
            status(StatusCode::SERVICE_UNAVAILABLE),
            Err(Error::msg("connection reset")),
            status(StatusCode::OK),
        ]);
        let (_, retry) = decorated(inner.clone(), RetryPolicy::constant(3, Duration::from_millis(1)));
        let res = retry.round_trip(HttpRequest::default()).await.unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_outcome() {
        let inner = Scripted::new(vec![
            status(StatusCode::BAD_GATEWAY),
            status(StatusCode::BAD_GATEWAY),
            status(StatusCode::SERVICE_UNAVAILABLE),
        ]);
        let (_, retry) = decorated(inner.clone(), RetryPolicy::constant(2, Duration::from_millis(1)));
        let res = retry.round_trip(HttpRequest::default()).await.unwrap();
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_no_retries_single_attempt() {
        let inner = Scripted::new(vec![Err(Error::msg("down"))]);
        let (_, retry) = decorated(inner.clone(), RetryPolicy::none());
        let err = retry.round_trip(HttpRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "down");
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_streamed_body_replayed_on_every_attempt() {
        let inner = Scripted::new(vec![
            status(StatusCode::INTERNAL_SERVER_ERROR),
            status(StatusCode::INTERNAL_SERVER_ERROR),
            status(StatusCode::CREATED),
        ]);
        let (_, retry) = decorated(inner.clone(), RetryPolicy::constant(3, Duration::from_millis(1)));

        let mut req = HttpRequest::default();
        req.body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"{\"order\":")),
            Ok(Bytes::from_static(b"42}")),
        ]));
        let res = retry.round_trip(req).await.unwrap();
        assert_eq!(res.status, StatusCode::CREATED);

        let bodies = inner.bodies.lock();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|b| b.as_ref() == b"{\"order\":42}"));
    }

    #[tokio::test]
    async fn test_body_read_failure_makes_no_attempt() {
        let inner = Scripted::new(vec![]);
        let (_, retry) = decorated(inner.clone(), RetryPolicy::default());
        let mut req = HttpRequest::default();
        req.body = Body::from_stream(stream::iter(vec![Err(io::Error::other("disk gone"))]));
        let err = retry.round_trip(req).await.unwrap_err();
        assert!(matches!(err, Error::Body(_)));
        assert_eq!(inner.calls(), 0);
    }

    #[tokio::test]
    async fn test_handle_restored_after_failure() {
        let inner = Scripted::new(vec![Err(Error::msg("down"))]);
        let ctx = Context::with_transport(inner.clone());
        intercept_transport(&ctx, RetryPolicy::none(), default_evaluator());
        assert!(ctx.transport_handle().is_decorated());

        let result = ctx.transport().round_trip(HttpRequest::default()).await;
        assert!(result.is_err());
        assert!(!ctx.transport_handle().is_decorated());

        // A fresh decoration wraps the original transport only once.
        intercept_transport(&ctx, RetryPolicy::none(), default_evaluator());
        ctx.transport().round_trip(HttpRequest::default()).await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn test_plugin_only_acts_before_dial() {
        let retry = Retry::default();
        let mut ctx = Context::new();
        retry.exec(phase::REQUEST, &mut ctx);
        assert!(!ctx.transport_handle().is_decorated());
        retry.exec(phase::BEFORE_DIAL, &mut ctx);
        assert!(ctx.transport_handle().is_decorated());
    }
}
