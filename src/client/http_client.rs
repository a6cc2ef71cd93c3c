use crate::auth::{AuthRefreshCoordinator, RequestReplayer};
use crate::client::HttpClientBuilder;
use crate::config::ClientConfig;
use crate::errors::{TransportError, TransportResult};
use crate::interceptors::InterceptorPipeline;
use crate::resilience::RetryPolicy;
use crate::transport::{
    Dispatcher, EventStream, MultipartForm, RequestBuilder, RequestConfig, RequestDescriptor,
    ResponseEnvelope, StreamingResponse, TextStream,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP client with interceptors, retries and single-flight token refresh.
///
/// Cloning is cheap; clones share configuration, interceptors and the
/// refresh coordinator.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) builder: RequestBuilder,
    pub(crate) pipeline: InterceptorPipeline,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) retry: RetryPolicy,
    pub(crate) coordinator: Option<Arc<AuthRefreshCoordinator>>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn coordinator(&self) -> Option<&Arc<AuthRefreshCoordinator>> {
        self.inner.coordinator.as_ref()
    }

    /// Forgets the session: pending refresh waiters are rejected and the
    /// stored tokens are cleared.
    pub fn reset_session(&self) {
        if let Some(coordinator) = &self.inner.coordinator {
            coordinator.reset();
            coordinator.store().clear_tokens();
        }
    }

    /// Sends a request and returns the JSON (or text) envelope.
    pub async fn request(&self, config: RequestConfig) -> TransportResult<ResponseEnvelope> {
        let descriptor = self.inner.builder.build(config)?;
        let outcome = self.send(descriptor).await;
        self.inner.pipeline.apply_response(outcome).await
    }

    pub async fn request_as<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> TransportResult<ResponseEnvelope<T>> {
        self.request(config).await?.into_typed()
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> TransportResult<ResponseEnvelope<T>> {
        self.request_as(RequestConfig::get(url)).await
    }

    pub async fn post<T, B>(&self, url: &str, body: &B) -> TransportResult<ResponseEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_as(RequestConfig::post(url).json(body)?).await
    }

    pub async fn put<T, B>(&self, url: &str, body: &B) -> TransportResult<ResponseEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_as(RequestConfig::put(url).json(body)?).await
    }

    pub async fn patch<T, B>(&self, url: &str, body: &B) -> TransportResult<ResponseEnvelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_as(RequestConfig::patch(url).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> TransportResult<ResponseEnvelope<T>> {
        self.request_as(RequestConfig::delete(url)).await
    }

    /// POSTs a multipart form.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        url: &str,
        form: MultipartForm,
    ) -> TransportResult<ResponseEnvelope<T>> {
        self.request_as(RequestConfig::post(url).multipart(form)).await
    }

    /// Sends a streaming request and returns the raw body stream.
    ///
    /// No retries. A 401 waits for the shared token refresh and re-issues
    /// the request once.
    pub async fn stream(&self, config: RequestConfig) -> TransportResult<StreamingResponse> {
        let descriptor = self.inner.builder.build_stream(config)?;
        let request = self.inner.pipeline.apply_request(descriptor.clone()).await?;
        let dispatched = if request.is_cancelled() {
            Err(TransportError::CallerAborted)
        } else {
            self.inner.dispatcher.execute_stream(&request).await
        };

        let outcome = match dispatched {
            Err(error) if error.is_unauthorized() => match &self.inner.coordinator {
                Some(coordinator) => match coordinator.wait_for_refresh(error).await {
                    Ok(()) => {
                        let replay = self.inner.pipeline.apply_request(descriptor.into_replay()).await?;
                        self.inner.dispatcher.execute_stream(&replay).await
                    }
                    Err(error) => Err(error),
                },
                None => Err(error),
            },
            outcome => outcome,
        };

        match outcome {
            Ok(response) => Ok(response),
            Err(error) => Err(self.inner.pipeline.apply_response_error(error).await),
        }
    }

    /// Streams the body as decoded text chunks.
    pub async fn stream_text(&self, config: RequestConfig) -> TransportResult<TextStream> {
        let cancellation = config.cancellation.clone();
        let response = self.stream(config).await?;
        Ok(TextStream::new(response.body, cancellation))
    }

    /// Streams the body as Server-Sent Events.
    pub async fn stream_events(&self, config: RequestConfig) -> TransportResult<EventStream> {
        let cancellation = config.cancellation.clone();
        let response = self.stream(config).await?;
        Ok(EventStream::new(response.body, cancellation))
    }

    /// Request interceptors, then attempts with backoff. A first 401 is
    /// handed to the refresh coordinator, whose result is final.
    async fn send(&self, descriptor: RequestDescriptor) -> TransportResult<ResponseEnvelope> {
        let request = self.inner.pipeline.apply_request(descriptor.clone()).await?;
        let mut attempt = 0;

        loop {
            if request.is_cancelled() {
                debug!(url = %request.url, "request cancelled before dispatch");
                return Err(TransportError::CallerAborted);
            }

            let error = match self.inner.dispatcher.execute(&request).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if error.is_unauthorized() && !request.auth_replay {
                if let Some(coordinator) = &self.inner.coordinator {
                    let replayer: Arc<dyn RequestReplayer> = Arc::new(self.clone());
                    return coordinator
                        .handle_unauthorized(descriptor, error, replayer)
                        .await;
                }
                return Err(error);
            }

            if !self.inner.retry.should_retry(&error, attempt, request.max_retries) {
                return Err(error);
            }

            let delay = self
                .inner
                .retry
                .delay_for_error(&error, attempt, request.retry_delay);
            warn!(
                url = %request.url,
                attempt = attempt + 1,
                max_retries = request.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying request"
            );

            match &request.cancellation {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(TransportError::CallerAborted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl RequestReplayer for HttpClient {
    async fn replay(&self, request: RequestDescriptor) -> TransportResult<ResponseEnvelope> {
        debug!(url = %request.url, "replaying request with refreshed token");
        self.send(request).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.config.base_url)
            .field("pipeline", &self.inner.pipeline)
            .field("refresh", &self.inner.coordinator.is_some())
            .finish()
    }
}
