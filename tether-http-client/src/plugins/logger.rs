//! Request logging plugin.

use tether_core::{Context, Control, Plugin, PluginState, phase};
use tracing::{debug, trace, warn};

/// Logs outgoing requests, responses and errors through `tracing`.
///
/// Requests are logged in the `before dial` phase, after every `request`
/// plugin had its say.
#[derive(Debug, Default)]
pub struct Logger {
    log_headers: bool,
    log_body: bool,
    state: PluginState,
}

impl Logger {
    /// Create a new logging plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }

    /// Enable logging of buffered bodies.
    pub fn with_body(mut self) -> Self {
        self.log_body = true;
        self
    }

    fn log_request(&self, ctx: &Context) {
        let request = &ctx.request;
        debug!(
            method = %request.method,
            uri = %request.uri,
            content_length = ?request.content_length(),
            "Sending HTTP request"
        );
        if self.log_headers {
            for (name, value) in &request.headers {
                trace!(header = %name, value = ?value, "Request header");
            }
        }
        if self.log_body
            && let Some(body) = request.body.as_bytes()
        {
            trace!(body = %String::from_utf8_lossy(body), "Request body");
        }
    }

    fn log_response(&self, ctx: &Context) {
        let Some(response) = &ctx.response else {
            return;
        };
        debug!(
            status = %response.status,
            uri = %ctx.request.uri,
            bytes = response.body.len(),
            "Received HTTP response"
        );
        if self.log_headers {
            for (name, value) in &response.headers {
                trace!(header = %name, value = ?value, "Response header");
            }
        }
        if self.log_body {
            trace!(body = %String::from_utf8_lossy(&response.body), "Response body");
        }
    }
}

impl Plugin for Logger {
    fn exec(&self, phase: &str, ctx: &mut Context) -> Control {
        match phase {
            phase::BEFORE_DIAL => self.log_request(ctx),
            phase::RESPONSE => self.log_response(ctx),
            phase::ERROR => {
                if let Some(error) = &ctx.error {
                    warn!(
                        method = %ctx.request.method,
                        uri = %ctx.request.uri,
                        error = %error,
                        "HTTP request failed"
                    );
                }
            }
            _ => {}
        }
        Control::Next
    }

    fn state(&self) -> Option<&PluginState> {
        Some(&self.state)
    }

    fn name(&self) -> &str {
        "logger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use tether_core::{Error, HttpResponse};

    #[test]
    fn test_logger_never_interrupts() {
        let logger = Logger::new().with_headers().with_body();
        let mut ctx = Context::new();
        ctx.request.set_header("x-trace", "1").unwrap();

        assert!(logger.exec(phase::BEFORE_DIAL, &mut ctx).is_next());
        ctx.set_response(HttpResponse::new(StatusCode::OK).with_body("ok"));
        assert!(logger.exec(phase::RESPONSE, &mut ctx).is_next());
        ctx.set_error(Error::msg("boom"));
        assert!(logger.exec(phase::ERROR, &mut ctx).is_next());

        // The error is left for the error phase to handle.
        assert!(ctx.has_error());
    }
}
