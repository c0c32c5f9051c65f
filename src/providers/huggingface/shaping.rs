//! Prompt shaping and continuation cleanup for hosted text-generation models.
//!
//! These models have no chat template or system channel, so the conversation
//! is flattened into whatever input the model family understands, and the
//! raw continuation is scrubbed of echoes, role labels and template tokens.

use super::types::{ConversationInputs, HuggingFaceInputs};
use crate::types::{last_user_index, split_system, Message, Role};
use regex::Regex;
use std::sync::LazyLock;

/// How a model expects its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// Flat `User:`/`Assistant:` transcript ending with an open assistant
    /// turn. Instruction-tuned causal models.
    Transcript,
    /// System text plus the most recent user message only. Text2text models.
    SingleTurn,
    /// Structured `{text, past_user_inputs, generated_responses}`.
    Conversational,
}

impl InputShape {
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.contains("t5") {
            InputShape::SingleTurn
        } else if model.contains("dialogpt") || model.contains("blenderbot") {
            InputShape::Conversational
        } else {
            InputShape::Transcript
        }
    }

    pub fn build_inputs(&self, messages: &[Message]) -> HuggingFaceInputs {
        let split = split_system(messages);
        let last_user = last_user_index(&split.turns);

        match self {
            InputShape::Transcript => {
                let mut prompt = String::new();
                if let Some(system) = &split.system {
                    prompt.push_str(system);
                    prompt.push_str("\n\n");
                }
                for turn in &split.turns {
                    let label = match turn.role {
                        Role::Assistant => "Assistant",
                        _ => "User",
                    };
                    prompt.push_str(label);
                    prompt.push_str(": ");
                    prompt.push_str(&turn.content);
                    prompt.push('\n');
                }
                prompt.push_str("Assistant:");
                HuggingFaceInputs::Text(prompt)
            }
            InputShape::SingleTurn => {
                let user = last_user
                    .map(|i| split.turns[i].content.as_str())
                    .unwrap_or_default();
                HuggingFaceInputs::Text(join_system(split.system.as_deref(), user))
            }
            InputShape::Conversational => {
                let (history, text) = match last_user {
                    Some(i) => (&split.turns[..i], split.turns[i].content.as_str()),
                    None => (&split.turns[..], ""),
                };
                let mut conversation = ConversationInputs {
                    text: join_system(split.system.as_deref(), text),
                    ..Default::default()
                };
                for turn in history {
                    match turn.role {
                        Role::Assistant => conversation.generated_responses.push(turn.content.clone()),
                        _ => conversation.past_user_inputs.push(turn.content.clone()),
                    }
                }
                HuggingFaceInputs::Conversation(conversation)
            }
        }
    }
}

fn join_system(system: Option<&str>, text: &str) -> String {
    match system {
        Some(system) if !text.is_empty() => format!("{system}\n\n{text}"),
        Some(system) => system.to_string(),
        None => text.to_string(),
    }
}

static SPECIAL_TOKENS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"<\|[^|>]*\|>|</?s>|<pad>|<unk>|\[/?INST\]|<</?SYS>>").ok()
});

static ROLE_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(assistant|bot|ai)\s*:\s*").ok());

/// Reduce a raw continuation to the newly generated answer.
pub fn clean_continuation(raw: &str, input: &str) -> String {
    let mut text = raw;
    if !input.is_empty() {
        if let Some(rest) = text.strip_prefix(input) {
            text = rest;
        }
    }

    let mut text = match SPECIAL_TOKENS.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };

    if let Some(re) = ROLE_PREFIX.as_ref() {
        while let Some(found) = re.find(&text) {
            if found.is_empty() {
                break;
            }
            text.replace_range(..found.end(), "");
        }
    }

    text.trim().to_string()
}
