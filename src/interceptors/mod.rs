//! Request and response interceptor chains.
//!
//! Interceptors run strictly in registration order for a given request.
//! Every handler has an identity default, so an interceptor only overrides
//! the hooks it cares about.

mod logging;

pub use logging::TracingInterceptor;

use crate::errors::{TransportError, TransportResult};
use crate::transport::{RequestDescriptor, ResponseEnvelope};
use async_trait::async_trait;
use std::sync::Arc;

/// Transforms outgoing requests.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Returns the descriptor to send, or an error that aborts the request.
    async fn on_request(&self, request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
        Ok(request)
    }

    /// Transforms the error raised by this interceptor's `on_request`.
    async fn on_request_error(&self, error: TransportError) -> TransportError {
        error
    }
}

/// Transforms responses and response errors.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(&self, response: ResponseEnvelope) -> TransportResult<ResponseEnvelope> {
        Ok(response)
    }

    /// Runs for any error reaching this point of the chain, including one
    /// raised by an earlier interceptor's `on_response`.
    async fn on_response_error(&self, error: TransportError) -> TransportError {
        error
    }
}

/// Ordered request and response chains.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    pub fn add_response(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    pub fn request_len(&self) -> usize {
        self.request.len()
    }

    pub fn response_len(&self) -> usize {
        self.response.len()
    }

    /// Runs the request chain. The first failing interceptor's error handler
    /// transforms the error, which is returned without running the rest.
    pub async fn apply_request(&self, mut request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
        for interceptor in &self.request {
            match interceptor.on_request(request).await {
                Ok(next) => request = next,
                Err(error) => return Err(interceptor.on_request_error(error).await),
            }
        }
        Ok(request)
    }

    /// Runs the response chain over a success or an error.
    pub async fn apply_response(
        &self,
        mut outcome: TransportResult<ResponseEnvelope>,
    ) -> TransportResult<ResponseEnvelope> {
        for interceptor in &self.response {
            outcome = match outcome {
                Ok(response) => interceptor.on_response(response).await,
                Err(error) => Err(interceptor.on_response_error(error).await),
            };
        }
        outcome
    }

    /// Runs only the error handlers, for outcomes that never produce an
    /// envelope (streams).
    pub async fn apply_response_error(&self, mut error: TransportError) -> TransportError {
        for interceptor in &self.response {
            error = interceptor.on_response_error(error).await;
        }
        error
    }
}

impl std::fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RequestBuilder, RequestConfig, RequestDefaults};
    use http::{HeaderMap, HeaderValue};
    use parking_lot::Mutex;
    use serde_json::json;

    fn descriptor() -> RequestDescriptor {
        RequestBuilder::new("https://api.example.com", HeaderMap::new(), RequestDefaults::default())
            .build(RequestConfig::get("/users"))
            .unwrap()
    }

    fn envelope() -> ResponseEnvelope {
        ResponseEnvelope {
            data: json!({}),
            status: 200,
            status_text: "OK".to_string(),
            headers: HeaderMap::new(),
        }
    }

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RequestInterceptor for Tag {
        async fn on_request(&self, request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
            self.log.lock().push(self.name.to_string());
            Ok(request.with_header(
                http::header::HeaderName::from_static("x-last"),
                HeaderValue::from_static(self.name),
            ))
        }
    }

    struct Reject {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RequestInterceptor for Reject {
        async fn on_request(&self, _request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
            self.log.lock().push("reject".to_string());
            Err(TransportError::config("missing tenant"))
        }

        async fn on_request_error(&self, error: TransportError) -> TransportError {
            TransportError::config(format!("rejected: {}", error))
        }
    }

    #[tokio::test]
    async fn test_request_chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = InterceptorPipeline::new();
        pipeline.add_request(Arc::new(Tag { name: "first", log: log.clone() }));
        pipeline.add_request(Arc::new(Tag { name: "second", log: log.clone() }));

        let request = pipeline.apply_request(descriptor()).await.unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert_eq!(request.headers.get("x-last").unwrap(), "second");
    }

    #[tokio::test]
    async fn test_request_failure_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = InterceptorPipeline::new();
        pipeline.add_request(Arc::new(Reject { log: log.clone() }));
        pipeline.add_request(Arc::new(Tag { name: "after", log: log.clone() }));

        let err = pipeline.apply_request(descriptor()).await.unwrap_err();
        assert_eq!(*log.lock(), vec!["reject"]);
        assert_eq!(
            err.to_string(),
            "Configuration error: rejected: Configuration error: missing tenant"
        );
    }

    struct FailOnEmpty;

    #[async_trait]
    impl ResponseInterceptor for FailOnEmpty {
        async fn on_response(&self, response: ResponseEnvelope) -> TransportResult<ResponseEnvelope> {
            if response.data == json!({}) {
                return Err(TransportError::Serialization {
                    message: "empty payload".to_string(),
                });
            }
            Ok(response)
        }
    }

    struct Relabel;

    #[async_trait]
    impl ResponseInterceptor for Relabel {
        async fn on_response_error(&self, error: TransportError) -> TransportError {
            TransportError::Stream {
                message: format!("relabelled {:?}", error.kind()),
            }
        }
    }

    #[tokio::test]
    async fn test_response_error_from_earlier_interceptor_is_seen() {
        let mut pipeline = InterceptorPipeline::new();
        pipeline.add_response(Arc::new(FailOnEmpty));
        pipeline.add_response(Arc::new(Relabel));

        let err = pipeline.apply_response(Ok(envelope())).await.unwrap_err();
        assert_eq!(err.to_string(), "Stream error: relabelled Serialization");
    }

    #[tokio::test]
    async fn test_response_error_chain_transforms_transport_error() {
        let mut pipeline = InterceptorPipeline::new();
        pipeline.add_response(Arc::new(Relabel));

        let err = pipeline
            .apply_response(Err(TransportError::Timeout { timeout_ms: 5 }))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Stream { .. }));
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_identity() {
        let pipeline = InterceptorPipeline::new();
        let request = pipeline.apply_request(descriptor()).await.unwrap();
        assert_eq!(request.url, "https://api.example.com/users");

        let response = pipeline.apply_response(Ok(envelope())).await.unwrap();
        assert_eq!(response.status, 200);
    }
}
