//! A unified gateway over multiple LLM providers.
//!
//! This library puts OpenAI, Groq, Anthropic Claude, Google Gemini, Hugging Face
//! and self-hosted Ollama behind one request/response contract, with streaming,
//! per-user rate limiting, response caching, usage accounting, retries and a
//! fallback provider handled by the [`Orchestrator`].

pub mod accumulator;
pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod ndjson_stream;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod rate_limiter;
pub mod registry;
pub mod response;
pub mod retry;
pub mod sse_stream;
pub mod streaming;
pub mod types;
pub mod usage;

// Re-export core types for easy usage
pub use cache::{CacheStore, MemoryStore};
pub use config::{GatewayConfig, OrchestratorConfig};
pub use error::{Error, ErrorKind};
pub use factory::{ProviderConfig, ProviderFactory};
pub use orchestrator::{FallbackPlan, Orchestrator, Target};
pub use provider::LLMProvider;
pub use providers::*;
pub use rate_limiter::{RateLimiter, RateLimits};
pub use registry::ProviderRegistry;
pub use response::*;
pub use retry::RetryPolicy;
pub use streaming::ChunkCallback;
pub use types::*;
pub use usage::UsageTracker;
