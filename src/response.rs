//! Canonical generation results.

use crate::types::Message;
use serde::{Deserialize, Serialize};

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Estimate usage for vendors that do not report token counts.
    pub fn estimate(messages: &[Message], completion: &str) -> Self {
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        Self::new(
            estimate_tokens(prompt_chars),
            estimate_tokens(completion.chars().count()),
        )
    }
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(char_count: usize) -> u32 {
    char_count.div_ceil(4) as u32
}

/// Reason why generation finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map the stop reasons vendors report onto the canonical set.
    pub fn from_vendor(reason: &str) -> Self {
        match reason {
            "stop" | "STOP" | "end_turn" | "stop_sequence" | "eos_token" => FinishReason::Stop,
            "length" | "MAX_TOKENS" | "max_tokens" => FinishReason::Length,
            "content_filter" | "SAFETY" | "RECITATION" | "BLOCKLIST" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// A complete, provider-agnostic generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    pub response_time_ms: u64,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub from_cache: bool,
}
