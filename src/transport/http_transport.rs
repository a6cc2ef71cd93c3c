//! HTTP transport implementations.

use crate::errors::{TransportError, TransportResult};
use crate::transport::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Method};
use reqwest::Client;
use std::time::Duration;

/// A request as handed to the platform transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response whose body is still being received.
pub struct StreamingResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The platform fetch primitive.
///
/// Implementations only move bytes: they report every status as data and
/// leave timeouts, classification and retries to the dispatcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the whole response body
    async fn send(&self, request: TransportRequest) -> TransportResult<TransportResponse>;

    /// Send a request and return the body as a byte stream
    async fn send_streaming(&self, request: TransportRequest) -> TransportResult<StreamingResponse>;
}

/// Reqwest-based HTTP transport implementation
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new reqwest transport
    pub fn new() -> TransportResult<Self> {
        let client = Client::builder().build().map_err(|e| {
            TransportError::config(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Create a transport with a connect timeout for the underlying pool
    pub fn with_connect_timeout(timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn prepare(&self, request: TransportRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder
    }
}

fn status_text(status: reqwest::StatusCode) -> String {
    status.canonical_reason().unwrap_or("").to_string()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> TransportResult<TransportResponse> {
        let response = self.prepare(request).send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status_text(status),
            headers,
            body,
        })
    }

    async fn send_streaming(&self, request: TransportRequest) -> TransportResult<StreamingResponse> {
        let response = self.prepare(request).send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::Stream {
                message: format!("Stream error: {}", e),
            })
        });

        Ok(StreamingResponse {
            status: status.as_u16(),
            status_text: status_text(status),
            headers,
            body: Box::pin(body),
        })
    }
}
