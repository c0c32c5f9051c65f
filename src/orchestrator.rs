//! The request pipeline every generation goes through.
//!
//! A request moves through `Validating → RateChecking → CacheLookup →
//! Generating → CacheStore → UsageRecord → Done`, or ends in `Failed`.
//! Only deterministic requests (temperature 0) touch the cache and only
//! requests carrying a user id are limited and accounted. When the
//! requested provider fails, the pipeline runs once more against the
//! fallback provider's default model.

use crate::cache::{response_cache_key, CacheStore, MemoryStore};
use crate::config::{GatewayConfig, OrchestratorConfig};
use crate::factory::ProviderFactory;
use crate::provider::LLMProvider;
use crate::providers::{Provider, ProviderKind};
use crate::rate_limiter::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::response::GenerationResult;
use crate::streaming::{synthesize_chunks, ChunkCallback};
use crate::types::{
    GenerationRequest, GenerationSettings, Message, ProviderHealth, ProviderInfo, UserStats,
};
use crate::usage::UsageTracker;
use crate::Error;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Validating,
    RateChecking,
    CacheLookup,
    Generating,
    CacheStore,
    UsageRecord,
    Done,
    Failed,
}

/// A provider and the model to ask it for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub provider: ProviderKind,
    pub model: String,
}

/// Targets tried in order: the requested one, then at most one fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPlan {
    targets: Vec<Target>,
}

impl FallbackPlan {
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn fallback(&self) -> Option<&Target> {
        self.targets.get(1)
    }
}

/// Why one pass of the pipeline stopped.
enum StageError {
    /// Validation or rate limiting refused the request before any provider
    /// call. Never triggers the fallback.
    Rejected(Error),
    /// The provider call failed. `fallback_allowed` is false once streamed
    /// text has reached the caller.
    Generation {
        error: Error,
        fallback_allowed: bool,
    },
}

impl StageError {
    fn generation(error: Error) -> Self {
        StageError::Generation {
            error,
            fallback_allowed: true,
        }
    }
}

fn enter(state: RequestState, target: &Target) {
    debug!(?state, provider = %target.provider, model = %target.model, "request state");
}

/// Mediates every generation request between callers and provider adapters.
pub struct Orchestrator {
    registry: ProviderRegistry,
    store: Arc<dyn CacheStore>,
    rate_limiter: RateLimiter,
    usage: UsageTracker,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn CacheStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(store.clone(), config.rate_limits.clone()),
            usage: UsageTracker::new(store.clone(), config.usage_ttl),
            registry,
            store,
            config,
        }
    }

    /// Build adapters and policy from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_config(GatewayConfig::from_env()?)
    }

    pub fn from_config(config: GatewayConfig) -> Result<Self, Error> {
        let registry = ProviderFactory::registry(&config.providers)?;
        if config.cache_url.is_some() {
            warn!("a shared cache is configured but no external store is linked, using the in-process store");
        }
        Ok(Self::new(
            registry,
            Arc::new(MemoryStore::new()),
            config.orchestrator,
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The requested target followed by the fallback, when one is configured,
    /// differs from the requested provider and is available.
    pub async fn plan(&self, provider: ProviderKind, model: &str) -> FallbackPlan {
        let mut targets = vec![Target {
            provider,
            model: model.to_string(),
        }];

        let fallback = self
            .config
            .fallback_provider
            .filter(|fallback| *fallback != provider)
            .and_then(|fallback| self.registry.available(fallback));
        if let Some(fallback) = fallback {
            targets.push(Target {
                provider: fallback.kind(),
                model: fallback_model(fallback).await,
            });
        }

        FallbackPlan { targets }
    }

    /// Generate a complete response.
    #[instrument(
        skip_all,
        fields(request_id = %Uuid::new_v4(), provider = %request.provider, model = %request.model)
    )]
    pub async fn generate_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, Error> {
        let provider = parse_provider(&request.provider)?;
        let messages = request.effective_messages();
        let plan = self.plan(provider, &request.model).await;

        let mut primary_error = None;
        for (index, target) in plan.targets().iter().enumerate() {
            if index > 0 {
                info!(fallback = %target.provider, model = %target.model, "trying fallback provider");
            }
            match self.run(target, &messages, request).await {
                Ok(result) => {
                    enter(RequestState::Done, target);
                    return Ok(result);
                }
                Err(failure) => {
                    enter(RequestState::Failed, target);
                    match settle(failure, index, &mut primary_error) {
                        Some(error) => return Err(error),
                        None => continue,
                    }
                }
            }
        }

        Err(primary_error.unwrap_or_else(|| Error::ProviderUnavailable(request.provider.clone())))
    }

    /// Generate a response, handing text to `on_chunk` as it arrives.
    ///
    /// The chunks concatenate to the returned content. Providers without a
    /// native stream generate in full and replay the text word by word.
    /// Once a chunk has been delivered, failures are no longer retried.
    #[instrument(
        skip_all,
        fields(request_id = %Uuid::new_v4(), provider = %request.provider, model = %request.model)
    )]
    pub async fn generate_streaming_response<F>(
        &self,
        request: &GenerationRequest,
        mut on_chunk: F,
    ) -> Result<GenerationResult, Error>
    where
        F: FnMut(&str) + Send,
    {
        let provider = parse_provider(&request.provider)?;
        let messages = request.effective_messages();
        let plan = self.plan(provider, &request.model).await;

        let mut primary_error = None;
        for (index, target) in plan.targets().iter().enumerate() {
            if index > 0 {
                info!(fallback = %target.provider, model = %target.model, "trying fallback provider");
            }
            match self
                .run_streaming(target, &messages, request, &mut on_chunk)
                .await
            {
                Ok(result) => {
                    enter(RequestState::Done, target);
                    return Ok(result);
                }
                Err(failure) => {
                    enter(RequestState::Failed, target);
                    match settle(failure, index, &mut primary_error) {
                        Some(error) => return Err(error),
                        None => continue,
                    }
                }
            }
        }

        Err(primary_error.unwrap_or_else(|| Error::ProviderUnavailable(request.provider.clone())))
    }

    /// Describe every registered provider.
    pub async fn available_providers(&self) -> BTreeMap<String, ProviderInfo> {
        let mut providers = BTreeMap::new();
        for (kind, provider) in self.registry.iter() {
            providers.insert(
                kind.as_str().to_string(),
                ProviderInfo {
                    display_name: kind.display_name().to_string(),
                    available: provider.is_available(),
                    models: provider.available_models().await,
                    features: provider.features().to_vec(),
                    supports_streaming: provider.supports_streaming(),
                    rate_limit_description: provider.rate_limit_description().to_string(),
                },
            );
        }
        providers
    }

    /// Probe every available provider concurrently.
    pub async fn providers_health(&self) -> BTreeMap<String, ProviderHealth> {
        let checks = self.registry.iter().map(|(kind, provider)| async move {
            let available = provider.is_available();
            let outcome = if available {
                Some(provider.health_check().await)
            } else {
                None
            };

            let error = match &outcome {
                Some(Err(e)) => {
                    warn!(provider = %kind, error = %e, "health check failed");
                    Some(e.to_string())
                }
                _ => None,
            };
            let health = ProviderHealth {
                available,
                healthy: matches!(outcome, Some(Ok(()))),
                last_checked: Utc::now(),
                error,
            };
            (kind.as_str().to_string(), health)
        });

        futures::future::join_all(checks)
            .await
            .into_iter()
            .collect()
    }

    /// Usage totals of `user_id` across every registered provider. Store
    /// failures yield empty totals.
    pub async fn user_stats(&self, user_id: &str) -> UserStats {
        match self.usage.user_stats(user_id, self.registry.kinds()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(user_id, error = %e, "usage totals unavailable");
                UserStats::default()
            }
        }
    }

    async fn validate(&self, target: &Target) -> Result<&Provider, Error> {
        enter(RequestState::Validating, target);
        let provider = self
            .registry
            .available(target.provider)
            .ok_or_else(|| Error::ProviderUnavailable(target.provider.as_str().to_string()))?;

        let models = provider.available_models().await;
        if !models.iter().any(|model| *model == target.model) {
            return Err(Error::ModelUnavailable {
                provider: target.provider.as_str().to_string(),
                model: target.model.clone(),
            });
        }
        Ok(provider)
    }

    async fn admit(&self, target: &Target, user_id: Option<&str>) -> Result<&Provider, StageError> {
        let provider = self.validate(target).await.map_err(StageError::Rejected)?;
        enter(RequestState::RateChecking, target);
        self.rate_limiter
            .check_rate_limit(target.provider, user_id)
            .await
            .map_err(StageError::Rejected)?;
        Ok(provider)
    }

    async fn run(
        &self,
        target: &Target,
        messages: &[Message],
        request: &GenerationRequest,
    ) -> Result<GenerationResult, StageError> {
        let user_id = request.user_id.as_deref();
        let settings = &request.settings;
        let provider = self.admit(target, user_id).await?;

        let cache_key = settings.is_deterministic().then(|| {
            response_cache_key(target.provider.as_str(), &target.model, messages, settings)
        });
        if let Some(key) = &cache_key {
            enter(RequestState::CacheLookup, target);
            if let Some(hit) = self.cached(key).await {
                return Ok(hit);
            }
        }

        enter(RequestState::Generating, target);
        let result = self
            .config
            .retry
            .run(provider, || {
                provider.generate_response(&target.model, messages, settings)
            })
            .await
            .map_err(StageError::generation)?;

        if let Some(key) = &cache_key {
            enter(RequestState::CacheStore, target);
            self.store_cached(key, &result).await;
        }
        self.record_usage(target, user_id, &result).await;
        Ok(result)
    }

    async fn run_streaming(
        &self,
        target: &Target,
        messages: &[Message],
        request: &GenerationRequest,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<GenerationResult, StageError> {
        let user_id = request.user_id.as_deref();
        let settings = &request.settings;
        let provider = self.admit(target, user_id).await?;

        enter(RequestState::Generating, target);
        let result = if provider.supports_streaming() {
            self.stream_with_retry(provider, target, messages, settings, on_chunk)
                .await?
        } else {
            let result = self
                .config
                .retry
                .run(provider, || {
                    provider.generate_response(&target.model, messages, settings)
                })
                .await
                .map_err(StageError::generation)?;
            synthesize_chunks(&result.content, self.config.synthetic_chunk_delay, on_chunk).await;
            result
        };

        self.record_usage(target, user_id, &result).await;
        Ok(result)
    }

    /// Retry a native stream only while nothing has reached the caller.
    async fn stream_with_retry(
        &self,
        provider: &Provider,
        target: &Target,
        messages: &[Message],
        settings: &GenerationSettings,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<GenerationResult, StageError> {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut delivered = false;
            let outcome = {
                let mut forward = |chunk: &str| {
                    delivered = true;
                    on_chunk(chunk);
                };
                provider
                    .generate_streaming_response(&target.model, messages, settings, &mut forward)
                    .await
            };

            let error = match outcome {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };
            let retryable = provider.is_retryable_error(&error);
            if delivered || !policy.should_retry(attempt, retryable) {
                if delivered {
                    warn!(provider = %target.provider, error = %error, "stream failed after delivering text");
                }
                return Err(StageError::Generation {
                    error: Error::GenerationFailed {
                        provider: target.provider.as_str().to_string(),
                        attempts: attempt,
                        source: Box::new(error),
                    },
                    fallback_allowed: !delivered,
                });
            }

            let delay = policy.backoff(attempt, provider.backoff_unit());
            warn!(
                provider = %target.provider,
                attempt,
                max_attempts = policy.max_attempts,
                ?delay,
                error = %error,
                "stream failed before any text, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn cached(&self, key: &str) -> Option<GenerationResult> {
        let started = Instant::now();
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "cache lookup failed");
                return None;
            }
        };

        match serde_json::from_str::<GenerationResult>(&raw) {
            Ok(mut result) => {
                result.from_cache = true;
                result.response_time_ms = started.elapsed().as_millis() as u64;
                debug!(key, "cache hit");
                Some(result)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    async fn store_cached(&self, key: &str, result: &GenerationResult) {
        let stored = match serde_json::to_string(result) {
            Ok(json) => self.store.set(key, json, self.config.cache_ttl).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!(key, error = %e, "failed to cache response");
        }
    }

    async fn record_usage(&self, target: &Target, user_id: Option<&str>, result: &GenerationResult) {
        let Some(user_id) = user_id else {
            return;
        };
        enter(RequestState::UsageRecord, target);
        if let Err(e) = self
            .usage
            .record(target.provider, user_id, result.usage.total_tokens)
            .await
        {
            warn!(provider = %target.provider, user_id, error = %e, "failed to record usage");
        }
    }
}

fn parse_provider(name: &str) -> Result<ProviderKind, Error> {
    name.parse()
        .map_err(|_| Error::ProviderUnavailable(name.to_string()))
}

/// The fallback's default model as its catalog names it. Discovered
/// catalogs carry tags, so `llama3.2` resolves to `llama3.2:latest`.
async fn fallback_model(provider: &Provider) -> String {
    let default = provider.default_model();
    let models = provider.available_models().await;
    if models.iter().any(|model| model == default) {
        return default.to_string();
    }
    let tagged = format!("{default}:");
    models
        .iter()
        .find(|model| model.starts_with(&tagged))
        .or_else(|| models.first())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Decide what a failed pass means for the plan: `Some` ends the request
/// with that error, `None` moves on to the next target.
///
/// A fallback that is refused before calling its provider reports the
/// primary's failure instead of its own.
fn settle(failure: StageError, index: usize, primary_error: &mut Option<Error>) -> Option<Error> {
    match failure {
        StageError::Rejected(error) => match primary_error.take() {
            Some(primary) if index > 0 => {
                warn!(error = %error, "fallback provider refused the request");
                Some(primary)
            }
            _ => Some(error),
        },
        StageError::Generation {
            error,
            fallback_allowed: true,
        } if index == 0 => {
            *primary_error = Some(error);
            None
        }
        StageError::Generation { error, .. } => Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{OllamaProvider, OpenAIProvider};

    fn orchestrator(fallback: Option<ProviderKind>) -> Orchestrator {
        let registry = ProviderRegistry::new()
            .with(Provider::OpenAI(
                OpenAIProvider::new(Some("sk".into())).unwrap(),
            ))
            .with(Provider::Groq(OpenAIProvider::groq(Some("gsk".into())).unwrap()))
            .with(Provider::Ollama(OllamaProvider::new(None).unwrap()));
        Orchestrator::new(
            registry,
            Arc::new(MemoryStore::new()),
            OrchestratorConfig {
                fallback_provider: fallback,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_plan_appends_available_fallback() {
        let plan = orchestrator(Some(ProviderKind::OpenAI))
            .plan(ProviderKind::Groq, "gemma2-9b-it")
            .await;
        assert_eq!(plan.targets().len(), 2);
        assert_eq!(
            plan.fallback(),
            Some(&Target {
                provider: ProviderKind::OpenAI,
                model: "gpt-4o-mini".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_plan_without_usable_fallback() {
        let orchestrator_with = orchestrator(Some(ProviderKind::OpenAI));
        assert!(orchestrator_with
            .plan(ProviderKind::OpenAI, "gpt-4o")
            .await
            .fallback()
            .is_none());

        assert!(orchestrator(Some(ProviderKind::Ollama))
            .plan(ProviderKind::Groq, "gemma2-9b-it")
            .await
            .fallback()
            .is_none());
        assert!(orchestrator(None)
            .plan(ProviderKind::Groq, "gemma2-9b-it")
            .await
            .fallback()
            .is_none());
    }

    #[tokio::test]
    async fn test_fallback_model_keeps_listed_default() {
        let provider = Provider::Ollama(OllamaProvider::new(None).unwrap());
        assert_eq!(fallback_model(&provider).await, "llama3.2");
    }

    #[test]
    fn test_settle_prefers_primary_failure() {
        let mut primary = None;
        let first = settle(
            StageError::generation(Error::provider_status("groq", 503, None, "down")),
            0,
            &mut primary,
        );
        assert!(first.is_none());
        assert!(primary.is_some());

        let second = settle(
            StageError::Rejected(Error::ProviderUnavailable("openai".into())),
            1,
            &mut primary,
        );
        assert_eq!(second.and_then(|e| e.status()), Some(503));
    }

    #[test]
    fn test_settle_stops_after_delivered_chunks() {
        let mut primary = None;
        let outcome = settle(
            StageError::Generation {
                error: Error::streaming("connection reset"),
                fallback_allowed: false,
            },
            0,
            &mut primary,
        );
        assert!(matches!(outcome, Some(Error::Streaming(_))));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unavailable() {
        let orchestrator = orchestrator(None);
        let request = GenerationRequest::new("cohere", "command", vec![Message::user("Hi")]);
        let err = orchestrator.generate_response(&request).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(name) if name == "cohere"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let orchestrator = orchestrator(None);
        let request = GenerationRequest::new("ollama", "llama3.2", vec![Message::user("Hi")]);
        let err = orchestrator
            .generate_streaming_response(&request, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_available_providers_describe_registry() {
        let providers = orchestrator(None).available_providers().await;
        assert_eq!(providers.len(), 3);
        let groq = &providers["groq"];
        assert!(groq.available);
        assert!(groq.supports_streaming);
        assert!(groq.models.contains(&"gemma2-9b-it".to_string()));
        assert!(!providers["ollama"].available);
    }
}
