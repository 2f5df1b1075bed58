//! reqwest-backed transport.

use crate::config::ClientConfig;
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, LazyLock};
use tether_core::{Body, Error, HttpRequest, HttpResponse, Result, Transport};
use tracing::trace;

static DEFAULT_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_default()
});

/// Classify a reqwest error.
pub(crate) fn map_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout(Arc::new(error))
    } else if error.is_connect() {
        Error::Connection(Arc::new(error))
    } else {
        Error::Transport(Arc::new(error))
    }
}

/// Performs round trips with a [`reqwest::Client`].
///
/// The client is expected to leave redirects alone; they are handled by the
/// redirect plugin.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a reqwest client from the connection settings of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none());

        if config.gzip {
            builder = builder.gzip(true);
        }
        if config.brotli {
            builder = builder.brotli(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client))
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Default for ReqwestTransport {
    /// Shares one process-wide client.
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT.clone())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            uri,
            headers,
            body,
        } = request;

        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(Error::InvalidUrl(format!("'{uri}' is not an absolute URL")));
        }
        let url = url::Url::parse(&uri.to_string())?;
        trace!(method = %method, url = %url, "Sending over reqwest");

        let mut builder = self.client.request(method, url).headers(headers);
        builder = match body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes),
            Body::Stream(shared) => {
                let stream = shared.take().ok_or_else(|| {
                    Error::from(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "body stream already consumed",
                    ))
                })?;
                builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
