//! # HTTP client transport
//!
//! Request pipeline for the chat, document and organization services:
//!
//! - request building with base-URL joining and query encoding
//! - request/response interceptor chains
//! - per-attempt timeouts that are told apart from caller cancellation
//! - retry with exponential backoff for network errors, timeouts, 5xx and 429
//! - exactly-once access-token refresh shared by every concurrent 401
//! - incremental UTF-8 decoding and Server-Sent-Event framing for streams
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_http_client::{ClientConfig, HttpClient, InMemoryTokenStore, RequestConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(
//!         InMemoryTokenStore::new()
//!             .with_access_token("access")
//!             .with_refresh_token("refresh")
//!             .with_refresher(|_refresh_token| async { Ok(Some("new-access".to_string())) }),
//!     );
//!
//!     let client = HttpClient::builder()
//!         .with_config(ClientConfig::builder().base_url("https://api.example.com").build()?)
//!         .with_token_store(store)
//!         .build()?;
//!
//!     let users = client
//!         .request(RequestConfig::get("/users").query("page", 1))
//!         .await?;
//!     println!("{}", users.data);
//!
//!     let mut events = client.stream_events(RequestConfig::post("/chat")).await?;
//!     while let Some(event) = events.next_event().await {
//!         let event = event?;
//!         if event.is_done() {
//!             break;
//!         }
//!         print!("{}", event.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `client` - `HttpClient` and its builder
//! - `config` - client configuration, defaults and environment loading
//! - `auth` - token store, bearer injection, refresh coordination, session events
//! - `interceptors` - request/response interceptor chains
//! - `resilience` - retry policy
//! - `transport` - request building, dispatch, platform transport, SSE streaming
//! - `errors` - error taxonomy
//! - `observability` - logging setup

#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod interceptors;
pub mod observability;
pub mod resilience;
pub mod transport;

#[cfg(test)]
pub(crate) mod mocks;

pub use auth::{
    AuthEvent, AuthRefreshCoordinator, BearerTokenInterceptor, InMemoryTokenStore, SessionEvents,
    TokenStore, UNAUTHORIZED_EVENT,
};
pub use client::{HttpClient, HttpClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use errors::{ErrorKind, TransportError, TransportResult};
pub use interceptors::{InterceptorPipeline, RequestInterceptor, ResponseInterceptor, TracingInterceptor};
pub use observability::{LogFormat, LogLevel, LoggingConfig};
pub use resilience::{RetryConfig, RetryPolicy};
pub use transport::{
    EventStream, HttpTransport, MultipartForm, ParamValue, ReqwestTransport, RequestConfig,
    RequestDescriptor, ResponseEnvelope, SseEvent, TextStream,
};

/// Default timeout for regular requests, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for streaming requests, in milliseconds
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 120_000;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay of the exponential backoff, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";
