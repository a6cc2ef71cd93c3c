use crate::errors::{TransportError, TransportResult};
use crate::transport::{ResponseEnvelope, TransportResponse};
use serde_json::Value;

pub struct ResponseParser;

impl ResponseParser {
    /// Classifies a buffered response into an envelope or an HTTP error.
    pub fn parse_response(response: TransportResponse) -> TransportResult<ResponseEnvelope> {
        if response.is_success() {
            Ok(ResponseEnvelope {
                data: Self::parse_success_body(&response.body),
                status: response.status,
                status_text: response.status_text,
                headers: response.headers,
            })
        } else {
            Err(Self::error_from_parts(
                response.status,
                response.status_text,
                response.headers,
                &response.body,
            ))
        }
    }

    /// JSON if the body is non-empty JSON, the raw text otherwise, and an
    /// empty object for an empty body.
    pub fn parse_success_body(body: &[u8]) -> Value {
        let text = String::from_utf8_lossy(body);
        if text.trim().is_empty() {
            return Value::Object(serde_json::Map::new());
        }
        serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
    }

    /// JSON, falling back to text, falling back to nothing.
    pub fn parse_error_body(body: &[u8]) -> Option<Value> {
        if body.is_empty() {
            return None;
        }
        if let Ok(value) = serde_json::from_slice(body) {
            return Some(value);
        }
        std::str::from_utf8(body)
            .ok()
            .map(|text| Value::String(text.to_string()))
    }

    pub fn error_from_parts(
        status: u16,
        status_text: String,
        headers: http::HeaderMap,
        body: &[u8],
    ) -> TransportError {
        TransportError::HttpStatus {
            status,
            status_text,
            body: Self::parse_error_body(body),
            headers,
        }
    }
}
