use crate::config::env_prefix;
use crate::provider::LLMProvider;
use crate::providers::{
    AnthropicProvider, GoogleProvider, HuggingFaceProvider, OllamaProvider, OpenAIProvider,
    Provider, ProviderKind,
};
use crate::registry::ProviderRegistry;
use crate::Error;
use tracing::{debug, info};

/// Configuration for creating one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Credential of hosted vendors.
    pub api_key: Option<String>,
    /// Endpoint override for hosted vendors, the server address for
    /// self-hosted ones.
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            base_url: None,
        }
    }

    /// Create configuration for a hosted provider.
    pub fn hosted(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self::new(kind).with_api_key(api_key)
    }

    /// Create configuration for the self-hosted provider.
    pub fn ollama(base_url: impl Into<String>) -> Self {
        Self::new(ProviderKind::Ollama).with_base_url(base_url)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Read `<PROVIDER>_API_KEY` and `<PROVIDER>_BASE_URL`. Gemini keys are
    /// also accepted as `GEMINI_API_KEY`.
    pub(crate) fn from_lookup(kind: ProviderKind, var: impl Fn(&str) -> Option<String>) -> Self {
        let prefix = env_prefix(kind);
        let mut api_key = var(&format!("{prefix}_API_KEY"));
        if api_key.is_none() && kind == ProviderKind::Google {
            api_key = var("GEMINI_API_KEY");
        }

        Self {
            kind,
            api_key,
            base_url: var(&format!("{prefix}_BASE_URL")),
        }
    }
}

/// Factory for creating LLM providers.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider from configuration. A provider without its
    /// credential is still created and reports itself unavailable.
    pub fn create(config: &ProviderConfig) -> Result<Provider, Error> {
        let api_key = config.api_key.clone();
        let base_url = config.base_url.clone();

        let provider = match config.kind {
            ProviderKind::OpenAI => Provider::OpenAI(match base_url {
                Some(url) => OpenAIProvider::new_with_base_url(api_key, url)?,
                None => OpenAIProvider::new(api_key)?,
            }),
            ProviderKind::Groq => Provider::Groq(match base_url {
                Some(url) => OpenAIProvider::groq_with_base_url(api_key, url)?,
                None => OpenAIProvider::groq(api_key)?,
            }),
            ProviderKind::Anthropic => Provider::Anthropic(match base_url {
                Some(url) => AnthropicProvider::new_with_base_url(api_key, url)?,
                None => AnthropicProvider::new(api_key)?,
            }),
            ProviderKind::Google => Provider::Google(match base_url {
                Some(url) => GoogleProvider::new_with_base_url(api_key, url)?,
                None => GoogleProvider::new(api_key)?,
            }),
            ProviderKind::HuggingFace => Provider::HuggingFace(match base_url {
                Some(url) => HuggingFaceProvider::new_with_base_url(api_key, url)?,
                None => HuggingFaceProvider::new(api_key)?,
            }),
            ProviderKind::Ollama => Provider::Ollama(OllamaProvider::new(base_url)?),
        };
        Ok(provider)
    }

    /// Build a registry holding one adapter per configuration.
    pub fn registry(configs: &[ProviderConfig]) -> Result<ProviderRegistry, Error> {
        let mut registry = ProviderRegistry::new();
        for config in configs {
            let provider = Self::create(config)?;
            if provider.is_available() {
                info!(provider = %config.kind, "provider configured");
            } else {
                debug!(provider = %config.kind, "provider not configured");
            }
            registry.insert(provider);
        }
        Ok(registry)
    }
}
