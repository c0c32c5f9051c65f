//! Running request and token totals per (provider, user).

use crate::cache::CacheStore;
use crate::providers::ProviderKind;
use crate::types::{ProviderUsage, UserStats};
use crate::Error;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Totals expire a day after the last write.
pub const USAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct UsageTracker {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(provider: ProviderKind, user_id: &str, field: &str) -> String {
        format!("llm:usage:{provider}:{user_id}:{field}")
    }

    /// Add one request and `tokens` to the totals and refresh their TTL.
    pub async fn record(
        &self,
        provider: ProviderKind,
        user_id: &str,
        tokens: u32,
    ) -> Result<(), Error> {
        let requests = Self::key(provider, user_id, "requests");
        let total_tokens = Self::key(provider, user_id, "tokens");
        let last_used = Self::key(provider, user_id, "last_used");

        self.store.incr(&requests, 1, self.ttl).await?;
        self.store
            .incr(&total_tokens, i64::from(tokens), self.ttl)
            .await?;
        self.store
            .set(&last_used, Utc::now().to_rfc3339(), self.ttl)
            .await?;

        self.store.expire(&requests, self.ttl).await?;
        self.store.expire(&total_tokens, self.ttl).await?;
        Ok(())
    }

    /// Totals for one (provider, user), `None` when nothing was recorded.
    pub async fn provider_usage(
        &self,
        provider: ProviderKind,
        user_id: &str,
    ) -> Result<Option<ProviderUsage>, Error> {
        let requests = self
            .store
            .get(&Self::key(provider, user_id, "requests"))
            .await?;
        let Some(requests) = requests else {
            return Ok(None);
        };

        let tokens = self
            .store
            .get(&Self::key(provider, user_id, "tokens"))
            .await?;
        let last_used = self
            .store
            .get(&Self::key(provider, user_id, "last_used"))
            .await?;

        Ok(Some(ProviderUsage {
            total_requests: requests.parse().unwrap_or(0),
            total_tokens: tokens.and_then(|t| t.parse().ok()).unwrap_or(0),
            last_used_at: last_used
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|t| t.with_timezone(&Utc)),
        }))
    }

    /// Totals for `user_id` across `providers`.
    pub async fn user_stats(
        &self,
        user_id: &str,
        providers: impl IntoIterator<Item = ProviderKind>,
    ) -> Result<UserStats, Error> {
        let mut stats = UserStats::default();
        for provider in providers {
            if let Some(usage) = self.provider_usage(provider, user_id).await? {
                stats.total_requests += usage.total_requests;
                stats.total_tokens += usage.total_tokens;
                stats.by_provider.insert(provider.as_str().to_string(), usage);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    #[tokio::test]
    async fn test_record_and_aggregate() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()), USAGE_TTL);
        tracker.record(ProviderKind::OpenAI, "u1", 10).await.unwrap();
        tracker.record(ProviderKind::OpenAI, "u1", 5).await.unwrap();
        tracker.record(ProviderKind::Anthropic, "u1", 7).await.unwrap();
        tracker.record(ProviderKind::OpenAI, "u2", 100).await.unwrap();

        let stats = tracker.user_stats("u1", ProviderKind::ALL).await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_tokens, 22);
        assert_eq!(stats.by_provider.len(), 2);

        let openai = &stats.by_provider["openai"];
        assert_eq!(openai.total_requests, 2);
        assert_eq!(openai.total_tokens, 15);
        assert!(openai.last_used_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_refresh_ttl() {
        let ttl = Duration::from_secs(100);
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()), ttl);
        tracker.record(ProviderKind::Groq, "u", 1).await.unwrap();

        tokio::time::advance(Duration::from_secs(90)).await;
        tracker.record(ProviderKind::Groq, "u", 1).await.unwrap();

        tokio::time::advance(Duration::from_secs(90)).await;
        let usage = tracker.provider_usage(ProviderKind::Groq, "u").await.unwrap();
        assert_eq!(usage.map(|u| u.total_requests), Some(2));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(tracker
            .provider_usage(ProviderKind::Groq, "u")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_is_empty() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()), USAGE_TTL);
        let stats = tracker.user_stats("nobody", ProviderKind::ALL).await.unwrap();
        assert_eq!(stats, UserStats::default());
    }
}
