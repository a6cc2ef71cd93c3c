mod dispatcher;
mod http_transport;
mod multipart;
mod request_builder;
mod response_parser;
mod stream_handler;
mod types;

pub use dispatcher::Dispatcher;
pub use http_transport::{
    HttpTransport, ReqwestTransport, StreamingResponse, TransportRequest, TransportResponse,
};
pub use multipart::MultipartForm;
pub use request_builder::{encode_query, join_url, RequestBuilder, RequestDefaults};
pub use response_parser::ResponseParser;
pub use stream_handler::{EventStream, SseEvent, SseParser, TextStream, Utf8Decoder};
pub use types::{
    ParamValue, QueryParams, RequestBody, RequestConfig, RequestDescriptor, ResponseEnvelope,
};

use crate::errors::TransportResult;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Raw response body delivered chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = TransportResult<Bytes>> + Send>>;
