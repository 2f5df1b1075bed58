//! Query string plugins.

use tether_core::plugin::on_request;
use tether_core::{Context, HandlerPlugin, Result};

fn edit_query<F>(ctx: &mut Context, edit: F) -> Result<()>
where
    F: FnOnce(&mut Vec<(String, String)>),
{
    let mut pairs = ctx.request.query_pairs();
    edit(&mut pairs);
    ctx.request.set_query_pairs(pairs)
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter().position(|(k, _)| k == key) {
        Some(first) => {
            pairs[first].1 = value.to_string();
            let mut index = 0;
            pairs.retain(|(k, _)| {
                let keep = index <= first || k != key;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_string(), value.to_string())),
    }
}

/// Set a query parameter, replacing existing values.
pub fn set(key: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    let (key, value) = (key.into(), value.into());
    on_request(move |ctx| edit_query(ctx, |pairs| set_pair(pairs, &key, &value)).into())
        .named("query_set")
}

/// Append a query parameter value.
pub fn add(key: impl Into<String>, value: impl Into<String>) -> HandlerPlugin {
    let (key, value) = (key.into(), value.into());
    on_request(move |ctx| {
        edit_query(ctx, |pairs| pairs.push((key.clone(), value.clone()))).into()
    })
    .named("query_add")
}

/// Remove every value of a query parameter.
pub fn del(key: impl Into<String>) -> HandlerPlugin {
    let key = key.into();
    on_request(move |ctx| edit_query(ctx, |pairs| pairs.retain(|(k, _)| *k != key)).into())
        .named("query_del")
}

/// Drop the whole query string.
pub fn del_all() -> HandlerPlugin {
    on_request(|ctx| edit_query(ctx, Vec::clear).into()).named("query_del_all")
}

/// Set several query parameters.
pub fn set_map<I, K, V>(params: I) -> HandlerPlugin
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let params: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    on_request(move |ctx| {
        edit_query(ctx, |pairs| {
            for (key, value) in &params {
                set_pair(pairs, key, value);
            }
        })
        .into()
    })
    .named("query_set_map")
}
