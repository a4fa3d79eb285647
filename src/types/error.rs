//! Error Types
//!
//! Centralized error types for the application, with failure classification
//! for retry decisions.
//!
//! ## Failure classes
//!
//! - **RateLimited**: remote quota rejection (wait out the window, retry)
//! - **RequestTooLarge**: payload rejected for size (never retried verbatim)
//! - **Transient**: network or temporary server issues (retry with backoff)
//! - **Fatal**: auth/bad-request failures no amount of retrying will fix
//!
//! Quota and transient failures are absorbed inside the completion client;
//! they never reach callers as errors. `DocloomError` covers the remaining
//! infrastructure faults (IO, config, collaborator transport).

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Provider Failure Classification
// =============================================================================

/// Failure class of one remote completion attempt, used by the retry policy
/// to pick the right backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Quota rejection signaled by the service
    RateLimited,
    /// Payload rejected for size; truncation must happen upstream
    RequestTooLarge,
    /// Network or temporary server failure
    Transient,
    /// Authentication or malformed-request failure
    Fatal,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::RequestTooLarge => write!(f, "REQUEST_TOO_LARGE"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Fatal => write!(f, "FATAL"),
        }
    }
}

impl ProviderErrorKind {
    /// Whether a verbatim retry of the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }
}

/// A classified failure from the completion collaborator.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Provider that produced the error
    pub provider: String,
    /// Wait suggested by the service, when it sent one
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(
        kind: ProviderErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            retry_after: None,
        }
    }

    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, provider, message)
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Classify an HTTP error status from an OpenAI-shaped completion API.
    ///
    /// Status codes are more reliable than message sniffing; the body is only
    /// consulted for 400s, where context-length rejections hide behind the
    /// same code as malformed requests.
    pub fn from_http_status(status: u16, body: &str, provider: &str) -> Self {
        let message = format!("HTTP {status}: {}", truncate_body(body));
        match status {
            429 => Self::new(ProviderErrorKind::RateLimited, provider, message),
            413 => Self::new(ProviderErrorKind::RequestTooLarge, provider, message),
            400 if mentions_size(body) => {
                Self::new(ProviderErrorKind::RequestTooLarge, provider, message)
            }
            400 | 401 | 403 | 404 => Self::new(ProviderErrorKind::Fatal, provider, message),
            500..=599 => Self::new(ProviderErrorKind::Transient, provider, message),
            _ => Self::new(ProviderErrorKind::Transient, provider, message),
        }
    }
}

fn mentions_size(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context_length")
        || lower.contains("context length")
        || lower.contains("too large")
        || lower.contains("maximum context")
        || (lower.contains("token") && lower.contains("exceed"))
}

fn truncate_body(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    body[..end].trim()
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DocloomError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Completion provider error: {0}")]
    Provider(ProviderError),

    #[error("Similarity store error: {0}")]
    Retrieval(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ProviderError> for DocloomError {
    fn from(err: ProviderError) -> Self {
        DocloomError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, DocloomError>;

// =============================================================================
// Tests
// =============================================================================
