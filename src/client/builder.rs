use crate::auth::{AuthRefreshCoordinator, BearerTokenInterceptor, SessionEvents, TokenStore};
use crate::client::http_client::{ClientInner, HttpClient};
use crate::config::ClientConfig;
use crate::errors::TransportResult;
use crate::interceptors::{InterceptorPipeline, RequestInterceptor, ResponseInterceptor};
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::transport::{Dispatcher, HttpTransport, ReqwestTransport, RequestBuilder};
use std::sync::Arc;

/// Assembles an [`HttpClient`].
///
/// With a token store, a bearer interceptor is registered ahead of any other
/// request interceptor and 401s are routed to a refresh coordinator (a new
/// one unless a shared coordinator is supplied).
pub struct HttpClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    token_store: Option<Arc<dyn TokenStore>>,
    coordinator: Option<Arc<AuthRefreshCoordinator>>,
    events: Option<SessionEvents>,
    retry: Option<RetryConfig>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            token_store: None,
            coordinator: None,
            events: None,
            retry: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Shares one coordinator between several clients so they refresh
    /// together.
    pub fn with_refresh_coordinator(mut self, coordinator: Arc<AuthRefreshCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Event bus for a coordinator created by this builder.
    pub fn with_events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> TransportResult<HttpClient> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => ClientConfig::default(),
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let coordinator = match (self.coordinator, self.token_store) {
            (Some(coordinator), _) => Some(coordinator),
            (None, Some(store)) => Some(Arc::new(AuthRefreshCoordinator::new(
                store,
                self.events.unwrap_or_default(),
            ))),
            (None, None) => None,
        };

        let mut pipeline = InterceptorPipeline::new();
        if let Some(coordinator) = &coordinator {
            pipeline.add_request(Arc::new(BearerTokenInterceptor::with_scheme(
                Arc::clone(coordinator.store()),
                config.auth_scheme.clone(),
            )));
        }
        for interceptor in self.request_interceptors {
            pipeline.add_request(interceptor);
        }
        for interceptor in self.response_interceptors {
            pipeline.add_response(interceptor);
        }

        let retry = RetryPolicy::new(self.retry.unwrap_or_else(|| config.retry_config()));
        let builder = RequestBuilder::new(
            config.base_url.clone(),
            config.default_headers.clone(),
            config.request_defaults(),
        );

        Ok(HttpClient::from_inner(ClientInner {
            config,
            builder,
            pipeline,
            dispatcher: Dispatcher::new(transport),
            retry,
            coordinator,
        }))
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
