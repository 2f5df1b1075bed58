//! Header plugins.

use tether_core::HandlerPlugin;
use tether_core::plugin::on_request;

/// Set a header, replacing existing values.
pub fn set(name: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    let (name, value) = (name.into(), value.into());
    on_request(move |ctx| ctx.request.set_header(&name, &value).into()).named("header_set")
}

/// Append a header value.
pub fn add(name: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    let (name, value) = (name.into(), value.into());
    on_request(move |ctx| ctx.request.append_header(&name, &value).into()).named("header_add")
}

/// Remove a header.
pub fn del(name: impl Into<String>) -> HandlerPlugin {
    let name = name.into().to_ascii_lowercase();
    on_request(move |ctx| {
        ctx.request.headers.remove(name.as_str());
        tether_core::Control::Next
    })
    .named("header_del")
}

/// Set several headers.
pub fn set_map<I, K, V>(fields: I) -> HandlerPlugin
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let fields: Vec<(String, String)> = fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    on_request(move |ctx| {
        fields
            .iter()
            .try_for_each(|(name, value)| ctx.request.set_header(name, value))
            .into()
    })
    .named("header_set_map")
}
