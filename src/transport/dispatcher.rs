//! Single-attempt execution with timeout and cancellation.

use crate::errors::{TransportError, TransportResult};
use crate::transport::{
    HttpTransport, RequestDescriptor, ResponseEnvelope, ResponseParser, StreamingResponse,
    TransportRequest,
};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Executes one attempt of a request.
///
/// Every attempt owns a controller token. It is a child of the caller's
/// token when one was supplied, so caller cancellation reaches it while the
/// attempt's own timer never cancels the caller's token.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Runs one buffered attempt and classifies its outcome.
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> TransportResult<ResponseEnvelope> {
        let request = to_transport_request(descriptor)?;
        debug!(method = %descriptor.method, url = %descriptor.url, "dispatching request");

        let response = self
            .with_deadline(descriptor, self.transport.send(request))
            .await?;

        debug!(status = response.status, url = %descriptor.url, "response received");
        ResponseParser::parse_response(response)
    }

    /// Runs one streaming attempt. Only the time to response headers (and, on
    /// failure, to the full error body) is bounded by the timeout.
    pub async fn execute_stream(&self, descriptor: &RequestDescriptor) -> TransportResult<StreamingResponse> {
        let request = to_transport_request(descriptor)?;
        debug!(method = %descriptor.method, url = %descriptor.url, "dispatching streaming request");

        let transport = Arc::clone(&self.transport);
        let attempt = async move {
            let mut response = transport.send_streaming(request).await?;
            if (200..300).contains(&response.status) {
                return Ok(response);
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.body.next().await {
                match chunk {
                    Ok(bytes) => body.extend_from_slice(&bytes),
                    Err(_) => break,
                }
            }
            Err(ResponseParser::error_from_parts(
                response.status,
                response.status_text,
                response.headers,
                &body,
            ))
        };

        self.with_deadline(descriptor, attempt).await
    }

    async fn with_deadline<T, F>(&self, descriptor: &RequestDescriptor, attempt: F) -> TransportResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        let controller = descriptor
            .cancellation
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);
        let timeout = descriptor.timeout;

        tokio::select! {
            biased;
            _ = controller.cancelled() => {
                debug!(url = %descriptor.url, "request cancelled by caller");
                Err(TransportError::CallerAborted)
            }
            result = attempt => result,
            _ = tokio::time::sleep(timeout) => {
                controller.cancel();
                warn!(url = %descriptor.url, timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

fn to_transport_request(descriptor: &RequestDescriptor) -> TransportResult<TransportRequest> {
    Ok(TransportRequest {
        method: descriptor.method.clone(),
        url: descriptor.url.clone(),
        headers: descriptor.headers.clone(),
        body: descriptor.body.encode()?,
    })
}
