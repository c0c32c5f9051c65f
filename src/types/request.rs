use super::message::Message;
use serde::{Deserialize, Serialize};

/// Sampling settings shared by every vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            top_k: 40,
            max_tokens: 1024,
            stop_sequences: None,
        }
    }
}

impl GenerationSettings {
    /// Deterministic requests are the only ones eligible for caching.
    pub fn is_deterministic(&self) -> bool {
        self.temperature == 0.0
    }

    pub fn stop_sequences(&self) -> Option<Vec<String>> {
        self.stop_sequences
            .as_ref()
            .filter(|stops| !stops.is_empty())
            .cloned()
    }
}

/// A provider-agnostic generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            messages,
            system_prompt: None,
            settings: GenerationSettings::default(),
            user_id: None,
            conversation_id: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The messages sent to the adapter: the system prompt (if any) as a
    /// leading system message, followed by the supplied history.
    pub fn effective_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system_prompt) = self.system_prompt.as_ref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system_prompt.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }
}
