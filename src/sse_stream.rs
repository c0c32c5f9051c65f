//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on an unterminated line before the stream is rejected.
const MAX_LINE_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event. Vendors put the event type inside the
/// JSON payload, so only the data lines are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event data.
    pub data: String,
}

/// Splits raw bytes into complete lines, keeping the partial tail for the
/// next chunk. Lines are only decoded once complete, so multi-byte UTF-8
/// sequences may straddle chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, Error> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + pos;
            lines.push(Self::decode(&self.buffer[start..end])?);
            start = end + 1;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            self.buffer.clear();
            return Err(Error::malformed_stream("stream line exceeded maximum size"));
        }
        Ok(lines)
    }

    /// Remaining unterminated bytes, consumed at end of stream.
    pub(crate) fn finish(&mut self) -> Result<Option<String>, Error> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let line = Self::decode(&self.buffer)?;
        self.buffer.clear();
        Ok(Some(line))
    }

    fn decode(bytes: &[u8]) -> Result<String, Error> {
        let line = std::str::from_utf8(bytes)
            .map_err(|e| Error::malformed_stream(format!("Invalid UTF-8 in stream: {e}")))?;
        Ok(line.strip_suffix('\r').unwrap_or(line).to_string())
    }
}

/// Accumulates SSE fields until a blank line dispatches the event.
#[derive(Debug, Default)]
struct EventBuilder {
    data_lines: Vec<String>,
}

impl EventBuilder {
    /// Feed one line; returns an event when the line terminates one.
    fn feed(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comments
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        // event, id, retry and unknown fields carry nothing we use
        if field.trim_start_matches('\u{feff}') == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseEvent { data })
    }
}

/// A stream adapter that parses SSE events from a byte stream.
/// Maintains internal state to handle events split across chunks.
pub struct SseStream<S> {
    inner: S,
    lines: LineBuffer,
    builder: EventBuilder,
    events: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            lines: LineBuffer::default(),
            builder: EventBuilder::default(),
            events: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {}",
                        e.into()
                    )))));
                }
                None => {
                    // Streams may end without the final blank line
                    self.finished = true;
                    let this = &mut *self;
                    match this.lines.finish() {
                        Ok(Some(line)) => {
                            if let Some(event) = this.builder.feed(&line) {
                                this.events.push_back(event);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                    if let Some(event) = this.builder.dispatch() {
                        this.events.push_back(event);
                    }
                    continue;
                }
            };

            let this = &mut *self;
            let lines = match this.lines.push(&chunk) {
                Ok(lines) => lines,
                Err(e) => return Poll::Ready(Some(Err(e))),
            };
            for line in lines {
                if let Some(event) = this.builder.feed(&line) {
                    this.events.push_back(event);
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
