//! Test doubles for the transport and the token store.

use crate::auth::TokenStore;
use crate::errors::{TransportError, TransportResult};
use crate::transport::{HttpTransport, StreamingResponse, TransportRequest, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, HeaderName, HeaderValue};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Scripted reply of [`MockHttpTransport`].
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Result<(u16, HeaderMap, Vec<Bytes>), TransportError>,
    delay: Option<Duration>,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            outcome: Ok((status, headers, vec![Bytes::from(body.to_string())])),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::chunks(status, vec![body])
    }

    /// A body delivered in several pieces on the streaming path.
    pub fn chunks(status: u16, chunks: Vec<&str>) -> Self {
        Self {
            outcome: Ok((
                status,
                HeaderMap::new(),
                chunks.into_iter().map(|c| Bytes::copy_from_slice(c.as_bytes())).collect(),
            )),
            delay: None,
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
        }
    }

    /// Delays the reply, letting timeouts and cancellation fire first.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        if let Ok((_, headers, _)) = &mut self.outcome {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        self
    }
}

type Handler = Box<dyn Fn(&TransportRequest) -> MockReply + Send + Sync>;

/// Transport that answers from a queue of replies, or from a handler once
/// the queue is empty, and records every request it sees.
pub struct MockHttpTransport {
    queue: Mutex<VecDeque<MockReply>>,
    handler: Option<Handler>,
    history: Mutex<Vec<(Instant, TransportRequest)>>,
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: None,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest) -> MockReply + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    pub fn queue(&self, reply: MockReply) {
        self.queue.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.history.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.history.lock().iter().map(|(t, _)| *t).collect()
    }

    pub fn request_count(&self) -> usize {
        self.history.lock().len()
    }

    async fn reply_for(&self, request: TransportRequest) -> TransportResult<(u16, HeaderMap, Vec<Bytes>)> {
        let reply = {
            let queued = self.queue.lock().pop_front();
            match (queued, &self.handler) {
                (Some(reply), _) => reply,
                (None, Some(handler)) => handler(&request),
                (None, None) => MockReply::error(TransportError::network(format!(
                    "No mock reply configured for {}",
                    request.url
                ))),
            }
        };
        self.history.lock().push((Instant::now(), request));

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}

impl Default for MockHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
        .to_string()
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: TransportRequest) -> TransportResult<TransportResponse> {
        let (status, headers, chunks) = self.reply_for(request).await?;
        Ok(TransportResponse {
            status,
            status_text: status_text(status),
            headers,
            body: Bytes::from(chunks.concat()),
        })
    }

    async fn send_streaming(&self, request: TransportRequest) -> TransportResult<StreamingResponse> {
        let (status, headers, chunks) = self.reply_for(request).await?;
        Ok(StreamingResponse {
            status,
            status_text: status_text(status),
            headers,
            body: Box::pin(stream::iter(chunks.into_iter().map(Ok))),
        })
    }
}

mock! {
    pub TokenStore {}

    #[async_trait]
    impl TokenStore for TokenStore {
        fn access_token(&self) -> Option<String>;
        async fn refresh_access_token(&self) -> TransportResult<Option<String>>;
        fn store_access_token(&self, token: &str);
        fn clear_tokens(&self);
        fn supports_refresh(&self) -> bool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request(url: &str) -> TransportRequest {
        TransportRequest {
            method: Method::GET,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_queue_before_handler() {
        let transport = MockHttpTransport::with_handler(|_| MockReply::text(204, ""));
        transport.queue(MockReply::json(200, serde_json::json!({"n": 1})));

        let first = transport.send(request("https://a/1")).await.unwrap();
        let second = transport.send(request("https://a/2")).await.unwrap();

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 204);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.requests()[1].url, "https://a/2");
    }

    #[tokio::test]
    async fn test_unconfigured_reply_is_network_error() {
        let transport = MockHttpTransport::new();
        let err = transport.send(request("https://a")).await.unwrap_err();
        assert!(matches!(err, TransportError::Network { .. }));
    }
}
