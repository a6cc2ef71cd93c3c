//! Client configuration.

use crate::errors::{TransportError, TransportResult};
use crate::resilience::RetryConfig;
use crate::transport::RequestDefaults;
use crate::{
    DEFAULT_AUTH_SCHEME, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_STREAM_TIMEOUT_MS,
    DEFAULT_TIMEOUT_MS,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Configuration shared by every request of one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix for relative request URLs; empty sends URLs as given
    pub base_url: String,
    /// Headers sent with every request; per-request headers win
    pub default_headers: HeaderMap,
    pub timeout: Duration,
    /// Default timeout for streaming requests
    pub stream_timeout: Duration,
    pub max_retries: u32,
    /// Base delay of the exponential backoff
    pub retry_delay: Duration,
    /// Cap on any single backoff delay
    pub max_retry_delay: Duration,
    /// Scheme in `Authorization: <scheme> <token>`
    pub auth_scheme: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_headers: HeaderMap::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            stream_timeout: Duration::from_millis(DEFAULT_STREAM_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_retry_delay: RetryConfig::default().max_delay,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Creates a configuration from environment variables
    ///
    /// Reads the following environment variables, all optional:
    /// - HTTP_CLIENT_BASE_URL
    /// - HTTP_CLIENT_TIMEOUT_MS
    /// - HTTP_CLIENT_STREAM_TIMEOUT_MS
    /// - HTTP_CLIENT_MAX_RETRIES
    /// - HTTP_CLIENT_RETRY_DELAY_MS
    /// - HTTP_CLIENT_AUTH_SCHEME
    pub fn from_env() -> TransportResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TransportResult<Self> {
        let millis = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(default))
        };

        let mut builder = ClientConfig::builder()
            .timeout(millis("HTTP_CLIENT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS))
            .stream_timeout(millis("HTTP_CLIENT_STREAM_TIMEOUT_MS", DEFAULT_STREAM_TIMEOUT_MS))
            .retry_delay(millis("HTTP_CLIENT_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS))
            .max_retries(
                lookup("HTTP_CLIENT_MAX_RETRIES")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(DEFAULT_MAX_RETRIES),
            );

        if let Some(base_url) = lookup("HTTP_CLIENT_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(scheme) = lookup("HTTP_CLIENT_AUTH_SCHEME") {
            builder = builder.auth_scheme(scheme);
        }

        builder.build()
    }

    /// Validates the configuration
    pub fn validate(&self) -> TransportResult<()> {
        if !self.base_url.is_empty() {
            Url::parse(&self.base_url).map_err(|e| {
                TransportError::config(format!("Invalid base URL '{}': {}", self.base_url, e))
            })?;
        }

        if self.timeout.is_zero() || self.stream_timeout.is_zero() {
            return Err(TransportError::config("Timeout must be greater than 0"));
        }

        if self.auth_scheme.trim().is_empty() {
            return Err(TransportError::config("Auth scheme must not be empty"));
        }

        Ok(())
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            timeout: self.timeout,
            stream_timeout: self.stream_timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_delay: self.max_retry_delay,
            ..RetryConfig::default()
        }
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    invalid_header: Option<TransportError>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Adds a default header. An invalid name or value is reported by `build`.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.config.default_headers.insert(name, value);
            }
            (Err(e), _) => self.invalid_header = Some(e.into()),
            (_, Err(e)) => self.invalid_header = Some(e.into()),
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.config.stream_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = delay;
        self
    }

    pub fn auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.auth_scheme = scheme.into();
        self
    }

    /// Builds and validates the configuration
    pub fn build(self) -> TransportResult<ClientConfig> {
        if let Some(error) = self.invalid_header {
            return Err(error);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
