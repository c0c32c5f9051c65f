use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capabilities advertised by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Chat,
    Streaming,
    SystemPrompt,
    LongContext,
    Vision,
    OpenSource,
    SelfHosted,
    FastInference,
}

/// Descriptor of one provider as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub display_name: String,
    pub available: bool,
    pub models: Vec<String>,
    pub features: Vec<Feature>,
    pub supports_streaming: bool,
    pub rate_limit_description: String,
}

/// Result of a monitoring probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub available: bool,
    pub healthy: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Running totals for one (provider, user) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsage {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Usage of one user across every provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub by_provider: BTreeMap<String, ProviderUsage>,
    pub total_requests: u64,
    pub total_tokens: u64,
}
