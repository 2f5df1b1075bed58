//! Body plugins and content type aliases.

use bytes::Bytes;
use futures::Stream;
use http::header::CONTENT_TYPE;
use serde::Serialize;
use std::io;
use tether_core::plugin::on_request;
use tether_core::{Body, Context, Control, Error, HandlerPlugin, Result};

/// Resolve a content type alias.
///
/// Known aliases are `html`, `json`, `xml`, `text`, `urlencoded`, `form` and
/// `form-data`. Anything else is returned unchanged.
pub fn resolve_type(alias: &str) -> &str {
    match alias {
        "html" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "text" => "text/plain",
        "urlencoded" | "form" | "form-data" => "application/x-www-form-urlencoded",
        other => other,
    }
}

/// Set the `Content-Type` header from a MIME type or alias.
pub fn content_type(alias: impl Into<String>) -> HandlerPlugin {
    let mime = resolve_type(&alias.into()).to_string();
    on_request(move |ctx| ctx.request.set_header(CONTENT_TYPE.as_str(), &mime).into())
        .named("content_type")
}

fn set_body(ctx: &mut Context, body: Body, mime: Option<&str>) -> Result<()> {
    ctx.request.body = body;
    if let Some(mime) = mime {
        ctx.request.set_header(CONTENT_TYPE.as_str(), mime)?;
    }
    Ok(())
}

/// Plugin setting an already encoded body, or failing with the encoding error.
fn encoded(
    encoded: std::result::Result<Bytes, String>,
    mime: &'static str,
    name: &'static str,
) -> HandlerPlugin {
    on_request(move |ctx| match &encoded {
        Ok(bytes) => set_body(ctx, Body::Bytes(bytes.clone()), Some(mime)).into(),
        Err(message) => Control::Error(Error::Serialization(message.clone())),
    })
    .named(name)
}

/// Raw bytes body. The content type is left alone.
pub fn bytes(data: impl Into<Bytes>) -> HandlerPlugin {
    let data: Bytes = data.into();
    on_request(move |ctx| set_body(ctx, Body::from(data.clone()), None).into()).named("body")
}

/// String body. The content type is left alone.
pub fn string(data: impl Into<String>) -> HandlerPlugin {
    bytes(data.into())
}

/// JSON body with `Content-Type: application/json`.
///
/// The value is serialized when the plugin is created; a serialization
/// failure surfaces as [`Error::Serialization`] when the request runs.
pub fn json<T: Serialize + ?Sized>(value: &T) -> HandlerPlugin {
    let result = serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| e.to_string());
    encoded(result, "application/json", "json")
}

/// URL-encoded form body.
pub fn form<T: Serialize + ?Sized>(value: &T) -> HandlerPlugin {
    let result = serde_urlencoded::to_string(value)
        .map(Bytes::from)
        .map_err(|e| e.to_string());
    encoded(result, "application/x-www-form-urlencoded", "form")
}

/// Streaming body.
///
/// The stream can be sent once. Clones of the request share it.
pub fn stream<S>(stream: S) -> HandlerPlugin
where
    S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
{
    let body = Body::from_stream(stream);
    on_request(move |ctx| set_body(ctx, body.clone(), None).into()).named("body_stream")
}
