//! Integration tests for common Tether workflows.
//!
//! These tests go through the facade crate the way applications do.

use std::time::Duration;
use tether::prelude::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Client Workflows
// =============================================================================

#[tokio::test]
async fn test_client_plugins_apply_to_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-request-source", "tether-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig::builder().base_url(server.uri()).build();
    let mut client = Client::new(config).unwrap();
    client.use_plugin(tether::plugins::headers::set("X-Request-Source", "tether-tests"));

    for target in ["/a", "/b"] {
        let res = client.get(target).send().await.unwrap();
        assert_eq!(res.text().unwrap(), "ok");
    }
}

#[tokio::test]
async fn test_response_phase_reads_client_context() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let config = ClientConfig::builder().base_url(server.uri()).build();
    let mut client = Client::new(config).unwrap();
    client.set("service", "directory");
    client.use_response(|ctx| {
        let service = ctx.get_string("service").unwrap_or_default();
        ctx.set("label", format!("{service}:{}", ctx.request.path()));
        Control::Next
    });

    let mut req = client.get("/users");
    req.send().await.unwrap();
    assert_eq!(
        req.context().get_string("label").as_deref(),
        Some("directory:/users")
    );
}

#[tokio::test]
async fn test_retry_and_error_phase_together() {
    let server = MockServer::start().await;
    Mock::given(path("/unstable"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .base_url(server.uri())
        .retry(RetryPolicy::constant(1, Duration::from_millis(5)))
        .build();
    let client = Client::new(config).unwrap();

    let err = client
        .get("/unstable")
        .use_response(|ctx| match &ctx.response {
            Some(res) if res.status.is_server_error() => {
                Control::Error(Error::Server(res.status))
            }
            _ => Control::Next,
        })
        .send()
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(tether::StatusCode::SERVICE_UNAVAILABLE));
    let attempts = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(attempts, 2);
}

// =============================================================================
// Engine Workflows
// =============================================================================

#[test]
fn test_middleware_without_client() {
    let mut middleware = Middleware::new();
    middleware.use_request(|ctx| {
        ctx.set("seen", true);
        Control::Next
    });
    let mut ctx = Context::new();

    let outcome = middleware.run(phase::REQUEST, &mut ctx);
    assert_eq!(outcome, tether::Outcome::Completed);
    assert_eq!(ctx.get_bool("seen"), Some(true));
    assert_eq!(ctx.phase().as_deref(), Some(phase::REQUEST));
}

#[test]
fn test_logging_settings_parse() {
    use tether::logging::{LogFormat, LogLevel};

    assert_eq!("warning".parse::<LogLevel>().ok(), Some(LogLevel::Warn));
    assert_eq!("text".parse::<LogFormat>().ok(), Some(LogFormat::Plain));
}
