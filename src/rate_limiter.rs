//! Fixed-window request limits per (provider, user).

use crate::cache::CacheStore;
use crate::providers::ProviderKind;
use crate::Error;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Length of one counting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Per-minute limits: a default plus optional per-provider overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    pub default_per_minute: u32,
    pub per_provider: BTreeMap<ProviderKind, u32>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            default_per_minute: 60,
            per_provider: BTreeMap::new(),
        }
    }
}

impl RateLimits {
    pub fn limit_for(&self, provider: ProviderKind) -> u32 {
        self.per_provider
            .get(&provider)
            .copied()
            .unwrap_or(self.default_per_minute)
    }
}

pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, limits: RateLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    fn key(provider: ProviderKind, user_id: &str) -> String {
        format!("llm:ratelimit:{provider}:{user_id}")
    }

    /// Count one request for `user_id` against `provider`'s window.
    ///
    /// Anonymous requests are not limited. When the store itself fails the
    /// request is admitted.
    pub async fn check_rate_limit(
        &self,
        provider: ProviderKind,
        user_id: Option<&str>,
    ) -> Result<(), Error> {
        let Some(user_id) = user_id else {
            return Ok(());
        };

        let limit = self.limits.limit_for(provider);
        let key = Self::key(provider, user_id);
        match self
            .store
            .incr_below(&key, i64::from(limit), RATE_LIMIT_WINDOW)
            .await
        {
            Ok(Some(count)) => {
                debug!(%provider, user_id, count, limit, "rate limit counted");
                Ok(())
            }
            Ok(None) => Err(Error::RateLimitExceeded {
                provider: provider.as_str().to_string(),
                limit,
                retry_after_secs: RATE_LIMIT_WINDOW.as_secs(),
            }),
            Err(e) => {
                warn!(%provider, user_id, error = %e, "rate limit store unavailable, admitting request");
                Ok(())
            }
        }
    }
}
