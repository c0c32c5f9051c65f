//! Delta accumulation logic for streaming responses.

use crate::response::{FinishReason, GenerationResult, Usage};
use crate::types::{Message, StreamEvent};
use std::time::Instant;

/// Accumulates streaming deltas into a complete result.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    finish_reason: Option<FinishReason>,
    /// Vendors split counts across events; each side keeps the last value seen.
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    done: bool,
}

impl ResponseAccumulator {
    /// Create a new response accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a stream event and update the accumulation.
    pub fn process_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ContentDelta { delta } => self.content.push_str(delta),
            StreamEvent::Usage { usage } => {
                if usage.prompt_tokens > 0 {
                    self.prompt_tokens = Some(usage.prompt_tokens);
                }
                if usage.completion_tokens > 0 {
                    self.completion_tokens = Some(usage.completion_tokens);
                }
            }
            StreamEvent::Finish { finish_reason } => self.finish_reason = Some(*finish_reason),
            StreamEvent::Done => self.done = true,
        }
    }

    /// Whether the vendor signalled the end of the stream.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Get the current accumulated content.
    pub fn current_content(&self) -> &str {
        &self.content
    }

    /// Finalize into a canonical result, estimating any missing token count.
    pub fn finalize(
        self,
        provider: &str,
        model: &str,
        messages: &[Message],
        started: Instant,
    ) -> GenerationResult {
        let estimated = Usage::estimate(messages, &self.content);
        let usage = Usage::new(
            self.prompt_tokens.unwrap_or(estimated.prompt_tokens),
            self.completion_tokens.unwrap_or(estimated.completion_tokens),
        );

        GenerationResult {
            content: self.content,
            usage,
            finish_reason: self.finish_reason.unwrap_or_default(),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: provider.to_string(),
            model: model.to_string(),
            from_cache: false,
        }
    }
}
