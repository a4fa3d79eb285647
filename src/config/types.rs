//! Configuration Types
//!
//! All configuration structures with defaults matching the published quota
//! and context limits. Supports global (~/.config/docloom/) and project
//! (.docloom/) level configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{chunking, context, limits, network, retry, summarize};
use crate::types::{DocloomError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document and summary locations
    pub paths: PathsConfig,

    /// Chunking parameters
    pub chunking: ChunkingConfig,

    /// Remote quota limits
    pub limits: LimitsConfig,

    /// Retry policy
    pub retry: RetryConfig,

    /// Context assembly budgets
    pub context: ContextConfig,

    /// Summarization settings
    pub summarize: SummarizeConfig,

    /// Similarity-store collaborator
    pub retrieval: RetrievalConfig,

    /// Completion service settings
    pub llm: LlmConfig,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(DocloomError::Config(
                "chunking.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(DocloomError::Config(format!(
                "chunking.overlap must be smaller than chunking.chunk_size, got {} >= {}",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.limits.rpm == 0 || self.limits.tpm == 0 {
            return Err(DocloomError::Config(
                "limits.rpm and limits.tpm must be greater than 0".to_string(),
            ));
        }
        if self.context.max_prompt_tokens > self.limits.tpm {
            return Err(DocloomError::Config(format!(
                "context.max_prompt_tokens ({}) cannot exceed the TPM quota ({})",
                self.context.max_prompt_tokens, self.limits.tpm
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(DocloomError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocloomError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(DocloomError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Paths
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of plain-text documents
    pub documents_dir: PathBuf,

    /// Directory of per-document condensed summaries
    pub summaries_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            summaries_dir: PathBuf::from("summaries"),
        }
    }
}

// =============================================================================
// Chunking
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub chunk_size: usize,

    /// Tokens shared between consecutive chunks; must be smaller than
    /// `chunk_size`
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: chunking::DEFAULT_CHUNK_SIZE,
            overlap: chunking::DEFAULT_OVERLAP,
        }
    }
}

// =============================================================================
// Quota Limits
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Requests-per-minute quota of the completion service
    pub rpm: u32,

    /// Tokens-per-minute quota of the completion service
    pub tpm: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rpm: limits::DEFAULT_RPM,
            tpm: limits::DEFAULT_TPM,
        }
    }
}

// =============================================================================
// Retry
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total provider calls allowed per logical completion
    pub max_attempts: u32,

    /// Base delay for transient-failure backoff (seconds)
    pub base_delay_secs: u64,

    /// Fixed cooldown after a remote quota rejection (seconds)
    pub quota_cooldown_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: retry::BASE_DELAY_SECS,
            quota_cooldown_secs: retry::QUOTA_COOLDOWN_SECS,
        }
    }
}

// =============================================================================
// Context Assembly
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Global prompt ceiling (tokens); kept below the TPM quota so one
    /// prompt plus the reserved output always fits a window
    pub max_prompt_tokens: usize,

    /// Per-passage truncation ceiling (tokens)
    pub max_passage_tokens: usize,

    /// Per-summary truncation ceiling (tokens)
    pub max_summary_tokens: usize,

    /// Passages retrieved per question
    pub top_k: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_prompt_tokens: (limits::DEFAULT_TPM as f64 * limits::SINGLE_REQUEST_TPM_FRACTION)
                as usize,
            max_passage_tokens: context::MAX_PASSAGE_TOKENS,
            max_summary_tokens: context::MAX_SUMMARY_TOKENS,
            top_k: context::DEFAULT_TOP_K,
        }
    }
}

// =============================================================================
// Summarization
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Token ceiling applied to a document before it is sent for
    /// summarization
    pub max_document_tokens: usize,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_document_tokens: summarize::MAX_DOCUMENT_TOKENS,
        }
    }
}

// =============================================================================
// Retrieval
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Base URL of the similarity-search service
    pub endpoint: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8750".to_string(),
            timeout_secs: network::RETRIEVAL_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// LLM
// =============================================================================

/// Completion service settings.
///
/// Note: the API key is never serialized to output and is redacted in debug
/// output; the provider converts it to a SecretString for runtime
/// protection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type; "openai-compatible" covers any endpoint speaking the
    /// OpenAI chat-completions shape
    pub provider: String,

    /// Model name (provider-specific)
    pub model: Option<String>,

    /// API base URL for compatible endpoints
    pub api_base: Option<String>,

    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate per completion; also reserved in the
    /// rate limiter's token projection
    pub max_output_tokens: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai-compatible".to_string(),
            model: None,
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.3,
            max_output_tokens: 768,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_prompt_ceiling_under_tpm() {
        let config = Config::default();
        assert_eq!(config.context.max_prompt_tokens, 5400);
        assert!(config.context.max_prompt_tokens <= config.limits.tpm);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config = Config {
            chunking: ChunkingConfig {
                chunk_size: 100,
                overlap: 100,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prompt_ceiling_cannot_exceed_tpm() {
        let config = Config {
            context: ContextConfig {
                max_prompt_tokens: 50_000,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_temperature_bounds() {
        let config = Config {
            llm: LlmConfig {
                temperature: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = Config {
            retry: RetryConfig {
                max_attempts: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
