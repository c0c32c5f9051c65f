use crate::provider::LLMProvider;
use crate::providers::{Provider, ProviderKind};
use std::collections::BTreeMap;

/// The adapters a gateway serves, one per [`ProviderKind`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `provider`, replacing any adapter of the same kind.
    pub fn with(mut self, provider: Provider) -> Self {
        self.insert(provider);
        self
    }

    pub fn insert(&mut self, provider: Provider) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Provider> {
        self.providers.get(&kind)
    }

    /// The adapter for `kind` if it is registered and configured.
    pub fn available(&self, kind: ProviderKind) -> Option<&Provider> {
        self.get(kind).filter(|provider| provider.is_available())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.providers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProviderKind, &Provider)> {
        self.providers.iter().map(|(kind, provider)| (*kind, provider))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
