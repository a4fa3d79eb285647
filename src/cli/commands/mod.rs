//! CLI Commands

pub mod ask;
pub mod config;
pub mod index;
pub mod summarize;
pub mod tokens;

use crate::ai::{CompletionClient, RateLimiter, RetryPolicy, Tokenizer, create_provider};
use crate::config::Config;
use crate::types::Result;

/// Wire the provider, limiter, and retry policy into one completion client.
/// The limiter is constructed here and handed to the client; nothing shares
/// it.
pub(crate) fn build_client(config: &Config, tokenizer: Tokenizer) -> Result<CompletionClient> {
    let provider = create_provider(&config.llm)?;
    let limiter = RateLimiter::new(
        config.limits.rpm,
        config.limits.tpm,
        config.llm.max_output_tokens,
    );
    Ok(CompletionClient::new(
        provider,
        limiter,
        tokenizer,
        RetryPolicy::from_config(&config.retry),
        config.llm.max_output_tokens,
        config.llm.temperature,
    ))
}
