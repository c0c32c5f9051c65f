use crate::response::Usage;
use serde::{Deserialize, Serialize};

/// Gemini `generateContent` request format.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    pub contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    pub generation_config: GoogleGenerationConfig,
}

/// Google content (message) format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>, // "user", "model"
    #[serde(default)]
    pub parts: Vec<GooglePart>,
}

/// Part of a Google content. Non-text parts deserialize with `text: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GooglePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GooglePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Google generation configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Google API response. Streamed payloads share this shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GoogleUsageMetadata>,
    #[serde(default)]
    pub prompt_feedback: Option<GooglePromptFeedback>,
}

impl GoogleResponse {
    /// Text of the first candidate, parts joined in order.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .or_else(|| {
                self.prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.as_deref())
                    .map(|_| "SAFETY")
            })
    }
}

/// Google response candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    #[serde(default)]
    pub content: Option<GoogleContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Set when the prompt itself was blocked and no candidate was produced.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Google usage metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u32>,
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
}

impl From<GoogleUsageMetadata> for Usage {
    fn from(metadata: GoogleUsageMetadata) -> Self {
        Usage::new(
            metadata.prompt_token_count.unwrap_or(0),
            metadata.candidates_token_count.unwrap_or(0),
        )
    }
}
