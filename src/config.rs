//! Gateway configuration, read once from the process environment.

use crate::factory::ProviderConfig;
use crate::provider::SYNTHETIC_CHUNK_DELAY;
use crate::providers::ProviderKind;
use crate::rate_limiter::RateLimits;
use crate::retry::RetryPolicy;
use crate::usage::USAGE_TTL;
use crate::Error;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Deterministic results stay cached for an hour.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Policy knobs of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub rate_limits: RateLimits,
    /// Provider tried once with its default model when a generation fails.
    pub fallback_provider: Option<ProviderKind>,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    pub usage_ttl: Duration,
    /// Delay between words when streaming is synthesized.
    pub synthetic_chunk_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimits::default(),
            fallback_provider: Some(ProviderKind::OpenAI),
            retry: RetryPolicy::default(),
            cache_ttl: CACHE_TTL,
            usage_ttl: USAGE_TTL,
            synthetic_chunk_delay: SYNTHETIC_CHUNK_DELAY,
        }
    }
}

/// Everything the gateway reads from its environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
    /// Connection string of a shared store, if one is deployed.
    pub cache_url: Option<String>,
    pub orchestrator: OrchestratorConfig,
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| ProviderConfig::from_lookup(kind, &var))
            .collect();

        let mut rate_limits = RateLimits::default();
        if let Some(limit) = parse_var(&var, "LLM_RATE_LIMIT_PER_MINUTE")? {
            rate_limits.default_per_minute = limit;
        }
        for kind in ProviderKind::ALL {
            let name = format!("{}_RATE_LIMIT_PER_MINUTE", env_prefix(kind));
            if let Some(limit) = parse_var(&var, &name)? {
                rate_limits.per_provider.insert(kind, limit);
            }
        }

        let fallback_provider = match var("LLM_FALLBACK_PROVIDER") {
            None => Some(ProviderKind::OpenAI),
            Some(name) if name.eq_ignore_ascii_case("none") => None,
            Some(name) => Some(name.parse().map_err(|_| {
                Error::config(format!("LLM_FALLBACK_PROVIDER names unknown provider '{name}'"))
            })?),
        };

        let delay_ms: Option<u64> = parse_var(&var, "LLM_STREAM_CHUNK_DELAY_MS")?;
        let synthetic_chunk_delay = delay_ms
            .map(Duration::from_millis)
            .unwrap_or(SYNTHETIC_CHUNK_DELAY);

        Ok(Self {
            providers,
            cache_url: var("CACHE_URL").or_else(|| var("REDIS_URL")),
            orchestrator: OrchestratorConfig {
                rate_limits,
                fallback_provider,
                synthetic_chunk_delay,
                ..OrchestratorConfig::default()
            },
        })
    }
}

/// Upper-case prefix of a provider's variables, e.g. `OPENAI`.
pub(crate) fn env_prefix(kind: ProviderKind) -> String {
    kind.as_str().to_uppercase()
}

fn parse_var<T: FromStr>(
    var: impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, Error> {
    var(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Error::config(format!("{name} must be a number, got '{value}'")))
        })
        .transpose()
}
