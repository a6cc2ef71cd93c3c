//! Request and response value types.

use crate::errors::{TransportError, TransportResult};
use crate::transport::MultipartForm;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A scalar query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Dropped during encoding
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => Ok(()),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        i64::try_from(v).map(ParamValue::Int).unwrap_or_else(|_| ParamValue::Str(v.to_string()))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Query parameters in insertion order.
pub type QueryParams = Vec<(String, ParamValue)>;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Structured value, serialized as JSON at dispatch
    Json(serde_json::Value),
    /// Raw bytes, sent unchanged
    Bytes {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Form data, sent unchanged
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Encodes the body for the wire.
    pub fn encode(&self) -> TransportResult<Option<Bytes>> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Json(value) => Ok(Some(Bytes::from(serde_json::to_vec(value)?))),
            RequestBody::Bytes { data, .. } => Ok(Some(data.clone())),
            RequestBody::Multipart(form) => Ok(Some(form.build())),
        }
    }
}

/// A logical request as written by the caller.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub params: QueryParams,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            params: Vec::new(),
            timeout: None,
            max_retries: None,
            retry_delay: None,
            cancellation: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds a header, replacing any previous value for the same name.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> TransportResult<Self> {
        let header_name = HeaderName::from_str(name.as_ref())?;
        let header_value = HeaderValue::from_str(value.as_ref())?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Appends a query parameter. `None` values are dropped when the URL is built.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets a structured body, serialized as JSON at dispatch.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> TransportResult<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn bytes(mut self, data: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        self.body = RequestBody::Bytes {
            data: data.into(),
            content_type: content_type.map(str::to_string),
        };
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// A transport-ready request produced by [`RequestBuilder`](crate::transport::RequestBuilder).
///
/// Interceptors receive descriptors by value and return new ones; nothing
/// mutates a descriptor once it has been handed to the pipeline.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub cancellation: Option<CancellationToken>,
    /// Set on requests re-sent after a token refresh
    pub auth_replay: bool,
}

impl RequestDescriptor {
    /// Returns a copy with one header replaced.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a copy marked as an authentication replay.
    pub fn into_replay(mut self) -> Self {
        self.auth_replay = true;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope<T = serde_json::Value> {
    pub data: T,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
}

impl<T> ResponseEnvelope<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            data: f(self.data),
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl ResponseEnvelope<serde_json::Value> {
    /// Deserializes the JSON body into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> TransportResult<ResponseEnvelope<T>> {
        let data = serde_json::from_value(self.data).map_err(|e| TransportError::Serialization {
            message: format!("Failed to deserialize response: {}", e),
        })?;
        Ok(ResponseEnvelope {
            data,
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
        })
    }
}
