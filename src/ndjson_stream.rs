//! Stream adapter for newline-delimited JSON bodies.

use crate::sse_stream::LineBuffer;
use crate::Error;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Yields one non-blank line per JSON document.
pub struct JsonLinesStream<S> {
    inner: S,
    lines: LineBuffer,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> JsonLinesStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            lines: LineBuffer::default(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn queue(&mut self, line: String) {
        if !line.trim().is_empty() {
            self.pending.push_back(line);
        }
    }
}

impl<S, E> Stream for JsonLinesStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => match self.lines.push(&chunk) {
                    Ok(lines) => lines.into_iter().for_each(|line| self.queue(line)),
                    Err(e) => return Poll::Ready(Some(Err(e))),
                },
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {}",
                        e.into()
                    )))));
                }
                None => {
                    self.finished = true;
                    match self.lines.finish() {
                        Ok(Some(line)) => self.queue(line),
                        Ok(None) => {}
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                }
            }
        }
    }
}
