use crate::auth::TokenStore;
use crate::errors::TransportResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;

type RefreshFn =
    Arc<dyn Fn(Option<String>) -> BoxFuture<'static, TransportResult<Option<String>>> + Send + Sync>;

/// Process-local token store.
///
/// Refreshing is delegated to a caller-supplied async function that receives
/// the current refresh token; without one the store cannot refresh.
pub struct InMemoryTokenStore {
    access: RwLock<Option<SecretString>>,
    refresh: RwLock<Option<SecretString>>,
    refresher: Option<RefreshFn>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self {
            access: RwLock::new(None),
            refresh: RwLock::new(None),
            refresher: None,
        }
    }

    pub fn with_access_token(self, token: impl Into<String>) -> Self {
        *self.access.write() = Some(SecretString::new(token.into()));
        self
    }

    pub fn with_refresh_token(self, token: impl Into<String>) -> Self {
        *self.refresh.write() = Some(SecretString::new(token.into()));
        self
    }

    /// Sets the function that exchanges the refresh token for an access token.
    pub fn with_refresher<F, Fut>(mut self, refresher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TransportResult<Option<String>>> + Send + 'static,
    {
        self.refresher = Some(Arc::new(move |token| Box::pin(refresher(token))));
        self
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh
            .read()
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenStore")
            .field("has_access_token", &self.access.read().is_some())
            .field("has_refresh_token", &self.refresh.read().is_some())
            .field("supports_refresh", &self.refresher.is_some())
            .finish()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.access
            .read()
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }

    async fn refresh_access_token(&self) -> TransportResult<Option<String>> {
        match &self.refresher {
            Some(refresher) => refresher(self.refresh_token()).await,
            None => Ok(None),
        }
    }

    fn store_access_token(&self, token: &str) {
        *self.access.write() = Some(SecretString::new(token.to_string()));
    }

    fn clear_tokens(&self) {
        *self.access.write() = None;
        *self.refresh.write() = None;
    }

    fn supports_refresh(&self) -> bool {
        self.refresher.is_some()
    }
}
