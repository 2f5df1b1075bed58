//! Outgoing request and incoming response descriptors.

use crate::body::Body;
use crate::error::{Error, Result};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::uri::{Authority, PathAndQuery, Scheme, Uri};
use http::{HeaderMap, Method, StatusCode};
use url::form_urlencoded;

/// Outgoing request descriptor.
///
/// The URI may be relative until a base URL plugin fills in scheme and host.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
}

impl HttpRequest {
    /// Create a request with the given method and URI.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            ..Default::default()
        }
    }

    /// Body length, when known.
    pub fn content_length(&self) -> Option<u64> {
        self.body.len()
    }

    /// Get a header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing existing values.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a header value without replacing existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Host (and port) of the target, if the URI is absolute.
    pub fn host(&self) -> Option<&str> {
        self.uri.authority().map(Authority::as_str)
    }

    /// URI path, `/` when empty.
    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    /// Replace scheme and authority, keeping path and query.
    pub fn set_origin(&mut self, scheme: Scheme, authority: Authority) -> Result<()> {
        let mut parts = self.uri.clone().into_parts();
        parts.scheme = Some(scheme);
        parts.authority = Some(authority);
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        self.uri = Uri::from_parts(parts).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(())
    }

    /// Replace the path, keeping the query string.
    pub fn set_path(&mut self, path: &str) -> Result<()> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let query = self.uri.query().map(str::to_string);
        self.set_path_and_query(&path, query.as_deref())
    }

    /// Decoded query parameters in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the query string with the given pairs.
    pub fn set_query_pairs<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            serializer.append_pair(k.as_ref(), v.as_ref());
        }
        let query = serializer.finish();
        let path = self.path().to_string();
        let query = (!query.is_empty()).then_some(query);
        self.set_path_and_query(&path, query.as_deref())
    }

    fn set_path_and_query(&mut self, path: &str, query: Option<&str>) -> Result<()> {
        let path_and_query = match query {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        };
        let mut parts = self.uri.clone().into_parts();
        parts.path_and_query = Some(
            PathAndQuery::try_from(path_and_query.as_str())
                .map_err(|e| Error::InvalidUrl(e.to_string()))?,
        );
        self.uri = Uri::from_parts(parts).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(())
    }
}

/// Incoming response descriptor with a fully read body.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Ok((name, value)) = parse_header(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Check if the status is 2xx.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name).map_err(|e| Error::InvalidHeader(e.to_string()))?;
    let value = HeaderValue::try_from(value).map_err(|e| Error::InvalidHeader(e.to_string()))?;
    Ok((name, value))
}
