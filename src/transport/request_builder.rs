use crate::errors::{TransportError, TransportResult};
use crate::transport::{ParamValue, RequestBody, RequestConfig, RequestDescriptor};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

/// Characters left unescaped in query keys and values, matching
/// `encodeURIComponent`.
const QUERY_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Per-request defaults applied when the caller leaves a field unset.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub timeout: Duration,
    pub stream_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
            stream_timeout: Duration::from_millis(crate::DEFAULT_STREAM_TIMEOUT_MS),
            max_retries: crate::DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(crate::DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Turns a [`RequestConfig`] into a transport-ready [`RequestDescriptor`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    default_headers: HeaderMap,
    defaults: RequestDefaults,
}

impl RequestBuilder {
    pub fn new(base_url: impl Into<String>, default_headers: HeaderMap, defaults: RequestDefaults) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers,
            defaults,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Builds a descriptor for a regular request.
    pub fn build(&self, config: RequestConfig) -> TransportResult<RequestDescriptor> {
        let timeout = self.defaults.timeout;
        self.build_with_timeout(config, timeout)
    }

    /// Builds a descriptor for a streaming request, which uses the longer
    /// streaming timeout by default.
    pub fn build_stream(&self, config: RequestConfig) -> TransportResult<RequestDescriptor> {
        let timeout = self.defaults.stream_timeout;
        self.build_with_timeout(config, timeout)
    }

    fn build_with_timeout(
        &self,
        config: RequestConfig,
        default_timeout: Duration,
    ) -> TransportResult<RequestDescriptor> {
        if config.url.trim().is_empty() {
            return Err(TransportError::config("Request URL is required"));
        }

        let mut url = join_url(&self.base_url, &config.url);
        let query = encode_query(&config.params);
        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        let headers = self.merge_headers(config.headers, &config.body)?;

        Ok(RequestDescriptor {
            url,
            method: config.method,
            headers,
            body: config.body,
            timeout: config.timeout.unwrap_or(default_timeout),
            max_retries: config.max_retries.unwrap_or(self.defaults.max_retries),
            retry_delay: config.retry_delay.unwrap_or(self.defaults.retry_delay),
            cancellation: config.cancellation,
            auth_replay: false,
        })
    }

    /// Merges default headers with request-specific headers and adds the
    /// content type implied by the body.
    fn merge_headers(&self, request_headers: HeaderMap, body: &RequestBody) -> TransportResult<HeaderMap> {
        let mut headers = self.default_headers.clone();
        for (key, value) in request_headers.iter() {
            headers.insert(key.clone(), value.clone());
        }

        if !headers.contains_key(CONTENT_TYPE) {
            let content_type = match body {
                RequestBody::Json(_) => Some(mime::APPLICATION_JSON.to_string()),
                RequestBody::Multipart(form) => Some(form.content_type()),
                RequestBody::Bytes { content_type, .. } => content_type.clone(),
                RequestBody::Empty => None,
            };
            if let Some(content_type) = content_type {
                headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
            }
        }

        Ok(headers)
    }
}

/// Joins a base URL and a request path. Absolute request URLs bypass the base.
pub fn join_url(base: &str, url: &str) -> String {
    if is_absolute(url) || base.is_empty() {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

fn is_absolute(url: &str) -> bool {
    match url.find("://") {
        Some(pos) if pos > 0 => {
            let scheme = &url[..pos];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Encodes query parameters in insertion order, skipping null values.
pub fn encode_query(params: &[(String, ParamValue)]) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_COMPONENT_SET),
                utf8_percent_encode(&value.to_string(), QUERY_COMPONENT_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
