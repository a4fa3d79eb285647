//! Completion Provider Abstraction
//!
//! One operation: generate text for a prompt against a remote completion
//! service. Implementations classify their failures into the retry taxonomy
//! ([`crate::types::ProviderErrorKind`]) so the resilient client can choose
//! the right backoff for each class.

mod openai;

pub use openai::OpenAiCompatProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::types::{DocloomError, ProviderError, Result};

// =============================================================================
// Request / Response Records
// =============================================================================

/// One completion request. Built per call, never persisted.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Estimated prompt tokens, for logging and accounting
    pub prompt_tokens: usize,
    pub max_output_tokens: usize,
    pub temperature: f32,
}

/// Token usage reported by (or estimated for) one completed call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens consumed (prompt + completion).
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Raw provider response before client-side accounting.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Model that served the request
    pub model: String,
}

/// Shared provider handle passed into the completion client.
pub type SharedProvider = Arc<dyn CompletionProvider>;

// =============================================================================
// Provider Trait
// =============================================================================

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Perform one remote completion call. Errors carry the failure class
    /// the retry policy dispatches on.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model currently in use
    fn model(&self) -> &str;

    /// Cheap availability probe.
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" | "openai-compatible" => Ok(Arc::new(OpenAiCompatProvider::new(config.clone())?)),
        other => Err(DocloomError::Config(format!(
            "Unknown provider: {other}. Supported: openai-compatible"
        ))),
    }
}
