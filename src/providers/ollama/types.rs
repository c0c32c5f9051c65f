use crate::response::Usage;
use serde::{Deserialize, Serialize};

/// `/api/chat` request body.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

/// Sampling options in Ollama's naming.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// One `/api/chat` object: the whole answer, or one NDJSON line of a stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OllamaChatResponse {
    pub fn usage(&self) -> Option<Usage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(Usage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        }
    }
}

/// `/api/tags` listing of locally pulled models.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTags {
    #[serde(default)]
    pub models: Vec<OllamaModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}
