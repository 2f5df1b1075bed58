//! HTTP response wrapper.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Uri};
use serde::de::DeserializeOwned;
use tether_core::{Error, HttpRequest, HttpResponse, Result, wire};

/// Response produced by [`Request::send`](crate::Request::send).
///
/// Holds the fully read response and the request as it was dispatched.
#[derive(Debug, Clone)]
pub struct Response {
    raw: HttpResponse,
    request: HttpRequest,
}

impl Response {
    pub(crate) fn new(raw: HttpResponse, request: HttpRequest) -> Self {
        Self { raw, request }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.raw.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_ok(&self) -> bool {
        self.raw.is_ok()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.raw.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.raw.status.is_server_error()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.raw.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.raw.header(name)
    }

    /// URL of the dispatched request.
    pub fn url(&self) -> &Uri {
        &self.request.uri
    }

    /// The request that produced this response.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn raw(&self) -> &HttpResponse {
        &self.raw
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.raw.body
    }

    /// Consume the response and return the body as bytes.
    pub fn into_bytes(self) -> Bytes {
        self.raw.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.raw.body.to_vec()).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.raw.body).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Get the content length if available.
    pub fn content_length(&self) -> Option<u64> {
        self.header(http::header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE)
    }

    /// Turn a 4xx or 5xx response into [`Error::Status`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_client_error() || self.is_server_error() {
            Err(Error::Status(self.raw.status))
        } else {
            Ok(self)
        }
    }

    /// HTTP/1.1 wire representation of the response.
    pub fn dump(&self, body: bool) -> String {
        wire::response_to_string(&self.raw, body)
    }
}
