//! Key/value store with per-entry TTL backing the response cache, rate
//! counters and usage totals.
//!
//! [`CacheStore`] is the seam for shared stores; [`MemoryStore`] is the
//! in-process implementation used for single-instance deployments and tests.

use crate::types::{GenerationSettings, Message};
use crate::Error;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::time::Duration;
use tokio::time::Instant;

/// Prefix of cached generation results.
pub const RESPONSE_KEY_PREFIX: &str = "llm:response:";

/// Operations the gateway needs from a store. Each call is atomic for its key.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error>;

    /// Returns whether the key existed.
    async fn del(&self, key: &str) -> Result<bool, Error>;

    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Add `delta` to an integer value and return the new value. A missing key
    /// starts at zero and gets `ttl_if_absent`; an existing key keeps its
    /// expiry.
    async fn incr(&self, key: &str, delta: i64, ttl_if_absent: Duration) -> Result<i64, Error>;

    /// Increment by one unless the value already reached `limit`.
    /// Returns `None` when the limit was reached and nothing changed.
    async fn incr_below(
        &self,
        key: &str,
        limit: i64,
        ttl_if_absent: Duration,
    ) -> Result<Option<i64>, Error>;

    /// Reset the expiry of an existing key. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, Error>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Sharded in-process store. Expired entries are dropped lazily on access
/// or in bulk by [`MemoryStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lock the counter at `key`, resetting it when missing or expired.
    /// The shard stays write-locked for the lifetime of the returned guard.
    fn counter(&self, key: &str, ttl_if_absent: Duration) -> RefMut<'_, String, Entry> {
        let now = Instant::now();
        let fresh = || Entry {
            value: "0".to_string(),
            expires_at: now + ttl_if_absent,
        };

        let mut slot = self.entries.entry(key.to_string()).or_insert_with(fresh);
        if slot.is_expired(now) {
            *slot = fresh();
        }
        slot
    }
}

fn parse_counter(key: &str, value: &str) -> Result<i64, Error> {
    value
        .parse()
        .map_err(|_| Error::cache(format!("value at {key} is not an integer")))
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some();
        if removed {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, Error> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        Ok(self.get(key).await?.is_some())
    }

    async fn incr(&self, key: &str, delta: i64, ttl_if_absent: Duration) -> Result<i64, Error> {
        let mut slot = self.counter(key, ttl_if_absent);
        let next = parse_counter(key, &slot.value)? + delta;
        slot.value = next.to_string();
        Ok(next)
    }

    async fn incr_below(
        &self,
        key: &str,
        limit: i64,
        ttl_if_absent: Duration,
    ) -> Result<Option<i64>, Error> {
        let mut slot = self.counter(key, ttl_if_absent);
        let current = parse_counter(key, &slot.value)?;
        if current >= limit {
            return Ok(None);
        }
        slot.value = (current + 1).to_string();
        Ok(Some(current + 1))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Cache key of a deterministic request: SHA-256 over the canonical JSON of
/// the provider, model, messages and the settings that affect output.
pub fn response_cache_key(
    provider: &str,
    model: &str,
    messages: &[Message],
    settings: &GenerationSettings,
) -> String {
    // serde_json maps are key-sorted, which keeps the encoding canonical
    let canonical = serde_json::json!({
        "provider": provider,
        "model": model,
        "messages": messages,
        "settings": {
            "temperature": settings.temperature,
            "maxTokens": settings.max_tokens,
            "topP": settings.top_p,
        },
    });

    let digest = Sha256::digest(canonical.to_string().as_bytes());
    let mut key = String::with_capacity(RESPONSE_KEY_PREFIX.len() + digest.len() * 2);
    key.push_str(RESPONSE_KEY_PREFIX);
    for byte in digest {
        let _ = write!(key, "{byte:02x}");
    }
    key
}
