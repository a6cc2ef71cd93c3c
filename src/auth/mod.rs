mod bearer;
mod events;
mod refresh;
mod token_store;

pub use bearer::BearerTokenInterceptor;
pub use events::{AuthEvent, SessionEvents, UNAUTHORIZED_EVENT};
pub use refresh::{AuthRefreshCoordinator, RefreshPhase, RequestReplayer};
pub use token_store::InMemoryTokenStore;

use crate::errors::TransportResult;
use async_trait::async_trait;

/// Storage of the session's credentials.
///
/// The client only reads the access token and asks the store to refresh,
/// persist or forget it; where and how tokens are kept is up to the
/// implementation.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current access token, if signed in
    fn access_token(&self) -> Option<String>;

    /// Exchanges the long-lived credential for a new access token.
    /// `Ok(None)` means the exchange completed without producing a token.
    async fn refresh_access_token(&self) -> TransportResult<Option<String>>;

    fn store_access_token(&self, token: &str);

    /// Forgets every stored credential
    fn clear_tokens(&self);

    /// Whether [`refresh_access_token`](Self::refresh_access_token) can succeed at all
    fn supports_refresh(&self) -> bool;
}
