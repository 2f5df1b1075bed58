//! URL plugins.
//!
//! All of them run in the `request` phase, in the order they were
//! registered, so a client-level [`base_url`] is applied before the
//! request-level [`path`] or [`url`].

use http::Uri;
use tether_core::plugin::on_request;
use tether_core::{Context, Control, Error, HandlerPlugin, Result};

fn has_scheme(raw: &str) -> bool {
    raw.contains("://")
}

/// Parse an absolute URL, assuming `http` when no scheme is given.
fn parse_absolute(raw: &str) -> Result<Uri> {
    let normalized = if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = url::Url::parse(&normalized)?;
    Uri::try_from(url.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))
}

fn join(base: &Uri, reference: &str) -> Result<Uri> {
    let base = url::Url::parse(&base.to_string())?;
    let joined = base.join(reference)?;
    Uri::try_from(joined.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))
}

fn apply_url(ctx: &mut Context, raw: &str) -> Result<()> {
    let uri = if has_scheme(raw) {
        parse_absolute(raw)?
    } else if ctx.request.uri.scheme().is_some() {
        join(&ctx.request.uri, raw)?
    } else if raw.starts_with('/') {
        Uri::try_from(raw).map_err(|e| Error::InvalidUrl(e.to_string()))?
    } else {
        parse_absolute(raw)?
    };
    ctx.request.uri = uri;
    Ok(())
}

/// Set the request URL.
///
/// A URL without a scheme is resolved against the current request URL when
/// that one is absolute (typically set by [`base_url`]); otherwise `http://`
/// is assumed.
pub fn url(raw: impl Into<String>) -> HandlerPlugin {
    let raw = raw.into();
    on_request(move |ctx| apply_url(ctx, &raw).into()).named("url")
}

/// Use the scheme, host and path of `raw`, keeping the current query.
pub fn base_url(raw: impl Into<String>) -> HandlerPlugin {
    let parsed = parse_absolute(&raw.into());
    on_request(move |ctx| {
        let base = match &parsed {
            Ok(base) => base,
            Err(err) => return Control::Error(err.clone()),
        };
        apply_base(ctx, base).into()
    })
    .named("base_url")
}

fn apply_base(ctx: &mut Context, base: &Uri) -> Result<()> {
    let (Some(scheme), Some(authority)) = (base.scheme(), base.authority()) else {
        return Err(Error::InvalidUrl(format!("'{base}' has no host")));
    };
    ctx.request.set_origin(scheme.clone(), authority.clone())?;
    match base.path() {
        "" | "/" => Ok(()),
        path => ctx.request.set_path(path),
    }
}

/// Replace the request path.
pub fn path(path: impl Into<String>) -> HandlerPlugin {
    let path = path.into();
    on_request(move |ctx| ctx.request.set_path(&path).into()).named("path")
}

/// Append a segment to the current request path.
pub fn add_path(segment: impl Into<String>) -> HandlerPlugin {
    let segment = segment.into();
    on_request(move |ctx| {
        let current = ctx.request.path().trim_end_matches('/');
        let joined = format!("{current}/{}", segment.trim_start_matches('/'));
        ctx.request.set_path(&joined).into()
    })
    .named("add_path")
}

/// Replace `:name` in the request path with `value`.
pub fn param(name: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    params([(name.into(), value.into())])
}

/// Replace several `:name` path placeholders.
pub fn params<I, K, V>(params: I) -> HandlerPlugin
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let params: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (format!(":{}", k.into()), v.into()))
        .collect();
    on_request(move |ctx| {
        let mut path = ctx.request.path().to_string();
        for (placeholder, value) in &params {
            path = path.replace(placeholder.as_str(), value);
        }
        ctx.request.set_path(&path).into()
    })
    .named("params")
}
