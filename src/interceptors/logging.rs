use crate::errors::{TransportError, TransportResult};
use crate::interceptors::{RequestInterceptor, ResponseInterceptor};
use crate::transport::{RequestDescriptor, ResponseEnvelope};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Logs requests, responses and errors through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    pub log_requests: bool,
    pub log_responses: bool,
    pub log_errors: bool,
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self {
            log_requests: true,
            log_responses: true,
            log_errors: true,
        }
    }
}

#[async_trait]
impl RequestInterceptor for TracingInterceptor {
    async fn on_request(&self, request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
        if self.log_requests {
            debug!(
                method = %request.method,
                url = %request.url,
                replay = request.auth_replay,
                timeout_ms = request.timeout.as_millis() as u64,
                "starting request"
            );
        }
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for TracingInterceptor {
    async fn on_response(&self, response: ResponseEnvelope) -> TransportResult<ResponseEnvelope> {
        if self.log_responses {
            debug!(status = response.status, "request completed");
        }
        Ok(response)
    }

    async fn on_response_error(&self, error: TransportError) -> TransportError {
        if self.log_errors {
            warn!(kind = ?error.kind(), status = ?error.status_code(), error = %error, "request failed");
        }
        error
    }
}
