use crate::auth::TokenStore;
use crate::errors::{TransportError, TransportResult};
use crate::interceptors::RequestInterceptor;
use crate::transport::RequestDescriptor;
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::HeaderValue;
use std::sync::Arc;

/// Injects `Authorization: <scheme> <token>` from the token store.
///
/// The token is read on every request, so replays after a refresh pick up
/// the new token. Requests without a stored token are sent unchanged.
pub struct BearerTokenInterceptor {
    store: Arc<dyn TokenStore>,
    scheme: String,
}

impl BearerTokenInterceptor {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_scheme(store, crate::DEFAULT_AUTH_SCHEME)
    }

    pub fn with_scheme(store: Arc<dyn TokenStore>, scheme: impl Into<String>) -> Self {
        Self {
            store,
            scheme: scheme.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}

#[async_trait]
impl RequestInterceptor for BearerTokenInterceptor {
    async fn on_request(&self, request: RequestDescriptor) -> TransportResult<RequestDescriptor> {
        let Some(token) = self.store.access_token() else {
            return Ok(request);
        };

        let mut value = HeaderValue::from_str(&format!("{} {}", self.scheme, token))
            .map_err(|_| TransportError::config("Access token is not a valid header value"))?;
        value.set_sensitive(true);

        Ok(request.with_header(AUTHORIZATION, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryTokenStore;
    use crate::transport::{RequestBuilder, RequestConfig, RequestDefaults};
    use http::HeaderMap;

    fn request() -> RequestDescriptor {
        RequestBuilder::new("https://api.example.com", HeaderMap::new(), RequestDefaults::default())
            .build(RequestConfig::get("/me"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_injects_bearer_token() {
        let store = Arc::new(InMemoryTokenStore::new().with_access_token("abc"));
        let interceptor = BearerTokenInterceptor::new(store);

        let request = interceptor.on_request(request()).await.unwrap();
        assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert!(request.headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[tokio::test]
    async fn test_custom_scheme() {
        let store = Arc::new(InMemoryTokenStore::new().with_access_token("abc"));
        let interceptor = BearerTokenInterceptor::with_scheme(store, "Token");

        let request = interceptor.on_request(request()).await.unwrap();
        assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Token abc");
    }

    #[tokio::test]
    async fn test_no_token_leaves_request_unchanged() {
        let interceptor = BearerTokenInterceptor::new(Arc::new(InMemoryTokenStore::new()));
        let request = interceptor.on_request(request()).await.unwrap();
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_invalid_token_is_config_error() {
        let store = Arc::new(InMemoryTokenStore::new().with_access_token("bad\ntoken"));
        let interceptor = BearerTokenInterceptor::new(store);
        assert!(matches!(
            interceptor.on_request(request()).await,
            Err(TransportError::Config { .. })
        ));
    }
}
