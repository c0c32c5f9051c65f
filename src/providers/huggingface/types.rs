use serde::{Deserialize, Serialize};

/// Inference API request body.
#[derive(Debug, Clone, Serialize)]
pub struct HuggingFaceRequest {
    pub inputs: HuggingFaceInputs,
    pub parameters: HuggingFaceParameters,
    pub options: HuggingFaceOptions,
}

/// Text-generation models take a flat string, conversational models a
/// structured history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HuggingFaceInputs {
    Text(String),
    Conversation(ConversationInputs),
}

impl HuggingFaceInputs {
    /// The text a model may echo back ahead of its continuation.
    pub fn echo_prefix(&self) -> &str {
        match self {
            HuggingFaceInputs::Text(text) => text,
            HuggingFaceInputs::Conversation(conversation) => &conversation.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConversationInputs {
    pub text: String,
    pub past_user_inputs: Vec<String>,
    pub generated_responses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HuggingFaceParameters {
    /// Omitted for greedy decoding; the API rejects a zero temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub top_p: f32,
    pub top_k: u32,
    pub max_new_tokens: u32,
    pub return_full_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    pub do_sample: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HuggingFaceOptions {
    pub wait_for_model: bool,
}

/// Text generation answers with a list, conversational models with a
/// single object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HuggingFaceResponse {
    Batch(Vec<GeneratedText>),
    Single(GeneratedText),
}

impl HuggingFaceResponse {
    pub fn into_text(self) -> Option<String> {
        match self {
            HuggingFaceResponse::Batch(items) => {
                items.into_iter().next().map(|item| item.generated_text)
            }
            HuggingFaceResponse::Single(item) => Some(item.generated_text),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedText {
    pub generated_text: String,
}
