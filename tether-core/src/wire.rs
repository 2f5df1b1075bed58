//! HTTP/1.1 text rendering of requests and responses, for debugging.

use crate::error::Result;
use crate::message::{HttpRequest, HttpResponse};
use http::HeaderMap;
use std::fmt::Write;

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    let mut lines: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                canonical_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    // Stable sort keeps multi-value headers in insertion order.
    lines.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in lines {
        let _ = write!(out, "{name}: {value}\r\n");
    }
}

/// Render the request head, plus the body when `body` is set and the body is
/// buffered.
pub fn request_to_string(request: &HttpRequest, body: bool) -> String {
    let target = request
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");

    let mut out = String::new();
    let _ = write!(out, "{} {} HTTP/1.1\r\n", request.method, target);
    if let Some(host) = request.host() {
        let _ = write!(out, "Host: {host}\r\n");
    }
    write_headers(&mut out, &request.headers);
    out.push_str("\r\n");

    if body && let Some(bytes) = request.body.as_bytes() {
        out.push_str(&String::from_utf8_lossy(bytes));
    }
    out
}

/// Render the response head, plus the body when `body` is set.
pub fn response_to_string(response: &HttpResponse, body: bool) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "HTTP/1.1 {} {}\r\n",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, &response.headers);
    out.push_str("\r\n");
    if body {
        out.push_str(&String::from_utf8_lossy(&response.body));
    }
    out
}

/// Render a request, buffering a streaming body first so it can still be
/// sent afterwards.
pub async fn dump_request(request: &mut HttpRequest, body: bool) -> Result<String> {
    if body && request.body.as_bytes().is_none() && !request.body.is_empty() {
        request.body.buffer().await?;
    }
    Ok(request_to_string(request, body))
}
