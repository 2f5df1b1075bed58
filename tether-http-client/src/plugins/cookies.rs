//! Cookie plugins.
//!
//! Cookies are folded into a single `Cookie` header as `name=value` pairs
//! separated by `; `. Adding a cookie never overwrites the ones already there.

use tether_core::plugin::on_request;
use tether_core::{Control, HandlerPlugin, HttpRequest, Result};

fn append(request: &mut HttpRequest, pairs: &[(String, String)]) -> Result<()> {
    let mut cookie = request.header("cookie").unwrap_or_default().to_string();
    for (name, value) in pairs {
        if !cookie.is_empty() {
            cookie.push_str("; ");
        }
        cookie.push_str(name);
        cookie.push('=');
        cookie.push_str(value);
    }
    if cookie.is_empty() {
        return Ok(());
    }
    request.set_header("Cookie", &cookie)
}

/// Add a cookie.
pub fn add(name: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    let pairs = vec![(name.into(), value.into())];
    on_request(move |ctx| append(&mut ctx.request, &pairs).into()).named("cookie_add")
}

/// Add several cookies, keeping their order.
pub fn add_multiple<I, K, V>(cookies: I) -> HandlerPlugin
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs: Vec<(String, String)> = cookies
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    on_request(move |ctx| append(&mut ctx.request, &pairs).into()).named("cookie_add_multiple")
}

/// Drop every cookie from the request.
pub fn del_all() -> HandlerPlugin {
    on_request(|ctx| {
        ctx.request.headers.remove(http::header::COOKIE);
        Control::Next
    })
    .named("cookie_del_all")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::phase::REQUEST;
    use tether_core::{Context, Error, Plugin};

    #[test]
    fn test_add_keeps_existing_cookies() {
        let mut ctx = Context::new();
        add("foo", "bar").exec(REQUEST, &mut ctx);
        add("session", "42").exec(REQUEST, &mut ctx);
        assert_eq!(ctx.request.header("cookie"), Some("foo=bar; session=42"));
    }

    #[test]
    fn test_add_multiple_and_del_all() {
        let mut ctx = Context::new();
        add_multiple([("a", "1"), ("b", "2")]).exec(REQUEST, &mut ctx);
        assert_eq!(ctx.request.header("cookie"), Some("a=1; b=2"));

        del_all().exec(REQUEST, &mut ctx);
        assert_eq!(ctx.request.header("cookie"), None);

        add_multiple(Vec::<(String, String)>::new()).exec(REQUEST, &mut ctx);
        assert_eq!(ctx.request.header("cookie"), None);
    }

    #[test]
    fn test_invalid_cookie_fails() {
        let mut ctx = Context::new();
        let control = add("foo", "bad\nvalue").exec(REQUEST, &mut ctx);
        assert!(matches!(control, Control::Error(Error::InvalidHeader(_))));
    }
}
