//! Authorization header plugins.

use base64::Engine;
use http::header::AUTHORIZATION;
use tether_core::HandlerPlugin;
use tether_core::plugin::on_request;

/// Use a raw `Authorization` header value.
pub fn custom(value: impl Into<String>) -> HandlerPlugin {
    let value = value.into();
    on_request(move |ctx| ctx.request.set_header(AUTHORIZATION.as_str(), &value).into())
        .named("auth")
}

/// Bearer token authentication.
pub fn bearer(token: impl AsRef<str>) -> HandlerPlugin {
    custom(format!("Bearer {}", token.as_ref()))
}

/// Basic authentication.
pub fn basic(username: impl AsRef<str>, password: impl AsRef<str>) -> HandlerPlugin {
    let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    custom(format!("Basic {encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::phase::REQUEST;
    use tether_core::{Context, Plugin};

    fn authorization(plugin: HandlerPlugin) -> Option<String> {
        let mut ctx = Context::new();
        plugin.exec(REQUEST, &mut ctx);
        ctx.request.header("authorization").map(str::to_string)
    }

    #[test]
    fn test_basic() {
        assert_eq!(
            authorization(basic("foo", "bar")).as_deref(),
            Some("Basic Zm9vOmJhcg==")
        );
    }

    #[test]
    fn test_bearer() {
        assert_eq!(authorization(bearer("foo")).as_deref(), Some("Bearer foo"));
    }

    #[test]
    fn test_custom() {
        assert_eq!(authorization(custom("Token foo")).as_deref(), Some("Token foo"));
    }
}
