//! Streaming normalization: vendor delta decoding and synthesized chunking.
//!
//! Every adapter exposes the same contract to callers: text arrives through
//! an `on_chunk` callback in order, and the concatenation of all chunks is
//! exactly the final content. Adapters with a native stream plug a
//! [`DeltaDecoder`] into [`decode_stream`]; the others generate in full and
//! replay the text through [`synthesize_chunks`].

use crate::accumulator::ResponseAccumulator;
use crate::ndjson_stream::JsonLinesStream;
use crate::sse_stream::SseStream;
use crate::types::StreamEvent;
use crate::Error;
use futures_util::{Stream, StreamExt};
use std::time::Duration;

/// Callback receiving text deltas in arrival order.
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Framing of a vendor's streaming body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `data:`-prefixed Server-Sent Events.
    Sse,
    /// One JSON document per line.
    JsonLines,
}

/// Turns one framed payload into stream events.
///
/// Implementations are vendor specific and hold whatever state the vendor's
/// protocol needs between payloads.
pub trait DeltaDecoder: Send {
    fn framing(&self) -> Framing;

    /// Decode one SSE `data` field or one NDJSON line.
    fn decode(&mut self, payload: &str) -> Result<Vec<StreamEvent>, Error>;
}

/// Decode a streaming body, forwarding text deltas to `on_chunk`.
pub async fn decode_stream<S, E>(
    byte_stream: S,
    decoder: &mut dyn DeltaDecoder,
    on_chunk: ChunkCallback<'_>,
) -> Result<ResponseAccumulator, Error>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin + Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match decoder.framing() {
        Framing::Sse => {
            let payloads = SseStream::new(byte_stream).map(|event| event.map(|e| e.data));
            drive(payloads, decoder, on_chunk).await
        }
        Framing::JsonLines => drive(JsonLinesStream::new(byte_stream), decoder, on_chunk).await,
    }
}

async fn drive<P>(
    mut payloads: P,
    decoder: &mut dyn DeltaDecoder,
    on_chunk: ChunkCallback<'_>,
) -> Result<ResponseAccumulator, Error>
where
    P: Stream<Item = Result<String, Error>> + Unpin + Send,
{
    let mut accumulator = ResponseAccumulator::new();

    while let Some(payload) = payloads.next().await {
        let payload = payload?;
        if payload.trim().is_empty() {
            continue;
        }
        for event in decoder.decode(&payload)? {
            if let StreamEvent::ContentDelta { delta } = &event {
                if delta.is_empty() {
                    continue;
                }
                on_chunk(delta);
            }
            accumulator.process_event(&event);
        }
        if accumulator.is_done() {
            break;
        }
    }

    Ok(accumulator)
}

/// Split text into one chunk per whitespace-delimited word.
///
/// Each chunk keeps the whitespace that follows it, and leading whitespace
/// stays on the first chunk, so joining the chunks restores the input.
pub fn split_words(content: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_word = false;
    let mut seen_word = false;

    for (i, c) in content.char_indices() {
        if c.is_whitespace() {
            in_word = false;
            continue;
        }
        if !in_word && seen_word {
            chunks.push(&content[start..i]);
            start = i;
        }
        in_word = true;
        seen_word = true;
    }
    if start < content.len() {
        chunks.push(&content[start..]);
    }
    chunks
}

/// Replay complete text as a word-by-word stream with a fixed delay between
/// chunks. Always emits at least one chunk.
pub async fn synthesize_chunks(content: &str, delay: Duration, on_chunk: ChunkCallback<'_>) {
    let chunks = split_words(content);
    if chunks.is_empty() {
        on_chunk(content);
        return;
    }

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        on_chunk(chunk);
    }
}
