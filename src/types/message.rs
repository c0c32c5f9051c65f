use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A message with role and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new message with role and text content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Messages with every `system` turn removed, plus the merged system text.
///
/// Vendors receive system text through their own instruction field, never as
/// a conversation turn.
#[derive(Debug, Clone, Default)]
pub struct SplitMessages<'a> {
    pub system: Option<String>,
    pub turns: Vec<&'a Message>,
}

/// Separate system instructions from the conversation turns.
pub fn split_system(messages: &[Message]) -> SplitMessages<'_> {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                if !message.content.trim().is_empty() {
                    system_parts.push(message.content.as_str());
                }
            }
            Role::User | Role::Assistant => turns.push(message),
        }
    }

    SplitMessages {
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        turns,
    }
}

/// Position of the most recent user message, if any.
pub fn last_user_index<M: Borrow<Message>>(messages: &[M]) -> Option<usize> {
    messages.iter().rposition(|m| m.borrow().role == Role::User)
}
