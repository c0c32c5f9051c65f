use thiserror::Error;

/// Errors that can occur when using the llm-gateway library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider {
        provider: String,
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    /// The vendor sent bytes that can never frame into events.
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    #[error("Cache store error: {0}")]
    Cache(String),

    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("Model not available: {model} is not offered by {provider}")]
    ModelUnavailable { provider: String, model: String },

    #[error("Rate limit exceeded for {provider}: {limit} requests per minute, retry in {retry_after_secs}s")]
    RateLimitExceeded {
        provider: String,
        limit: u32,
        retry_after_secs: u64,
    },

    #[error("Generation failed on {provider} after {attempts} attempt(s): {source}")]
    GenerationFailed {
        provider: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

/// How the orchestrator treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credential or broken setup. Never retried.
    Configuration,
    /// Unknown provider or model. Never retried.
    Validation,
    /// Per-user budget exhausted. Never retried.
    RateLimited,
    /// Network failure, 429 or 5xx. Retried.
    Transient,
    /// Other 4xx, model not found, unparseable payloads.
    Terminal,
    /// Failures of the best-effort cache and usage subsystems.
    CacheOrUsage,
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Provider error carrying the HTTP status and optional vendor error code.
    pub fn provider_status(
        provider: impl Into<String>,
        status: u16,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Provider {
            provider: provider.into(),
            status: Some(status),
            code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn malformed_stream(message: impl Into<String>) -> Self {
        Error::MalformedStream(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Error::Cache(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(e) => {
                if let Some(status) = e.status() {
                    return status_kind(status.as_u16());
                }
                if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Terminal
                }
            }
            Error::Serialization(_) => ErrorKind::Terminal,
            Error::Provider {
                status,
                code,
                message,
                ..
            } => {
                if is_model_not_found(*status, code.as_deref(), message) {
                    return ErrorKind::Terminal;
                }
                match status {
                    Some(status) => status_kind(*status),
                    None => ErrorKind::Terminal,
                }
            }
            Error::Config(_) => ErrorKind::Configuration,
            Error::Streaming(_) => ErrorKind::Transient,
            Error::MalformedStream(_) => ErrorKind::Terminal,
            Error::Cache(_) => ErrorKind::CacheOrUsage,
            Error::ProviderUnavailable(_) | Error::ModelUnavailable { .. } => ErrorKind::Validation,
            Error::RateLimitExceeded { .. } => ErrorKind::RateLimited,
            Error::GenerationFailed { source, .. } => source.kind(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// HTTP status reported by the vendor, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Provider { status, .. } => *status,
            Error::GenerationFailed { source, .. } => source.status(),
            _ => None,
        }
    }
}

fn status_kind(status: u16) -> ErrorKind {
    match status {
        429 | 500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Terminal,
    }
}

fn is_model_not_found(status: Option<u16>, code: Option<&str>, message: &str) -> bool {
    if matches!(
        code,
        Some("model_not_found") | Some("not_found_error") | Some("NOT_FOUND")
    ) {
        return true;
    }
    status == Some(404) && message.to_lowercase().contains("not found")
}
