use crate::errors::{TransportError, TransportResult};
use crate::transport::ByteStream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across chunk boundaries is held back until
/// its remaining bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // incomplete tail, wait for more bytes
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flushes whatever is held back once the byte stream has ended.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// One Server-Sent Event record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    /// Every `data:` line, each followed by `\n`
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// True for the `[DONE]` sentinel many chat backends send last.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    pub fn parse_json<T: DeserializeOwned>(&self) -> TransportResult<T> {
        serde_json::from_str(self.data.trim_end_matches('\n')).map_err(|e| {
            TransportError::Serialization {
                message: format!("Failed to parse event data: {}", e),
            }
        })
    }
}

/// Line framer for SSE text.
///
/// Text is split on `\n`; the unterminated remainder stays buffered until
/// the next call. An event is emitted on a blank line, and only when it has
/// data.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: Option<SseEvent>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds decoded text and returns the events it completed.
    pub fn feed(&mut self, text: &str) -> Vec<SseEvent> {
        self.buffer.push_str(text);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches('\n');
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.process_line(line, &mut events);
        }

        events
    }

    /// Text received but not yet terminated by a newline.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            let ready = self
                .current
                .as_ref()
                .map(|event| !event.data.is_empty())
                .unwrap_or(false);
            if ready {
                events.extend(self.current.take());
            }
            return;
        }

        if let Some(value) = line.strip_prefix("data: ") {
            let event = self.current.get_or_insert_with(SseEvent::default);
            event.data.push_str(value);
            event.data.push('\n');
        } else if let Some(value) = line.strip_prefix("event: ") {
            self.current.get_or_insert_with(SseEvent::default).event = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("id: ") {
            self.current.get_or_insert_with(SseEvent::default).id = Some(value.to_string());
        }
    }
}

/// Decoded text chunks of a streamed body.
///
/// Finite and not restartable. Cancelling, either through [`cancel`](Self::cancel)
/// or the token given at construction, releases the body and ends iteration.
pub struct TextStream {
    body: Option<ByteStream>,
    decoder: Utf8Decoder,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl TextStream {
    pub fn new(body: ByteStream, cancellation: Option<CancellationToken>) -> Self {
        Self {
            body: Some(body),
            decoder: Utf8Decoder::new(),
            cancelled: cancellation.map(|token| Box::pin(token.cancelled_owned())),
        }
    }

    pub async fn next_chunk(&mut self) -> Option<TransportResult<String>> {
        self.next().await
    }

    /// Releases the underlying body. Later polls yield nothing.
    pub fn cancel(&mut self) {
        self.body = None;
        self.cancelled = None;
    }

    pub fn is_finished(&self) -> bool {
        self.body.is_none()
    }

    fn poll_cancelled(&mut self, cx: &mut Context<'_>) -> bool {
        let fired = self
            .cancelled
            .as_mut()
            .map(|fut| fut.as_mut().poll(cx).is_ready())
            .unwrap_or(false);
        if fired {
            tracing::debug!("stream cancelled by caller");
            self.cancel();
        }
        fired
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream")
            .field("finished", &self.is_finished())
            .field("cancellable", &self.cancelled.is_some())
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl Stream for TextStream {
    type Item = TransportResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.poll_cancelled(cx) {
            return Poll::Ready(None);
        }

        loop {
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let text = this.decoder.decode(&chunk);
                    if !text.is_empty() {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.cancel();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.body = None;
                    this.cancelled = None;
                    let tail = this.decoder.finish();
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(tail)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// SSE events framed from a streamed body.
///
/// A field block still open when the body ends or the stream is cancelled
/// is discarded.
pub struct EventStream {
    text: TextStream,
    parser: SseParser,
    ready: VecDeque<SseEvent>,
}

impl EventStream {
    pub fn new(body: ByteStream, cancellation: Option<CancellationToken>) -> Self {
        Self::from_text(TextStream::new(body, cancellation))
    }

    pub fn from_text(text: TextStream) -> Self {
        Self {
            text,
            parser: SseParser::new(),
            ready: VecDeque::new(),
        }
    }

    pub async fn next_event(&mut self) -> Option<TransportResult<SseEvent>> {
        self.next().await
    }

    pub fn cancel(&mut self) {
        self.text.cancel();
        self.ready.clear();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("text", &self.text)
            .field("parser", &self.parser)
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl Stream for EventStream {
    type Item = TransportResult<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.text.poll_cancelled(cx) {
            this.ready.clear();
            return Poll::Ready(None);
        }

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match Pin::new(&mut this.text).poll_next(cx) {
                Poll::Ready(Some(Ok(text))) => {
                    this.ready.extend(this.parser.feed(&text));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
