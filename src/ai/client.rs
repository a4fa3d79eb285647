//! Resilient Completion Client
//!
//! Wraps a completion provider with the rate limiter and a bounded,
//! failure-class-aware retry policy. The retry loop is an explicit state
//! machine: each attempt either succeeds, maps its error to a retry step
//! with the backoff for that failure class, or ends the call terminally.
//!
//! Quota and transient failures are absorbed here and never reach the
//! caller. The two failures that do surface — an oversized prompt and
//! exhausted retries — surface as values rather than errors, so a batch
//! driver can log the item and continue with the next one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::ai::limiter::{Clock, RateLimiter, SystemClock};
use crate::ai::provider::{CompletionRequest, SharedProvider, TokenUsage};
use crate::ai::tokenizer::Tokenizer;
use crate::config::RetryConfig;
use crate::constants::retry;
use crate::types::{ProviderError, ProviderErrorKind};

// =============================================================================
// Retry Policy
// =============================================================================

/// Retry tuning for one client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total provider calls allowed per logical completion
    pub max_attempts: u32,
    /// Transient failures back off `base_delay * attempt`
    pub base_delay: Duration,
    /// Fixed cooldown after a remote quota rejection
    pub quota_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(retry::BASE_DELAY_SECS),
            quota_cooldown: Duration::from_secs(retry::QUOTA_COOLDOWN_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.base_delay_secs),
            quota_cooldown: Duration::from_secs(config.quota_cooldown_secs),
        }
    }

    /// Decide what happens after a failed attempt.
    fn next_step(&self, error: &ProviderError, attempt: u32) -> RetryStep {
        if error.kind == ProviderErrorKind::RequestTooLarge {
            return RetryStep::TooLarge;
        }
        if attempt >= self.max_attempts || !error.kind.is_retryable() {
            return RetryStep::GiveUp;
        }
        match error.kind {
            ProviderErrorKind::RateLimited => RetryStep::Retry {
                delay: error.retry_after.unwrap_or(self.quota_cooldown),
                reset_window: true,
            },
            _ => RetryStep::Retry {
                delay: self.base_delay * attempt,
                reset_window: false,
            },
        }
    }
}

/// Transition taken by the retry state machine after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
enum RetryStep {
    /// Sleep, optionally reset the limiter window, then attempt again
    Retry { delay: Duration, reset_window: bool },
    /// The prompt itself is the problem; never retried verbatim
    TooLarge,
    /// Stop and report the call unanswered
    GiveUp,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Successful completion plus the usage actually consumed, so downstream
/// reporting reflects real numbers.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Outcome of one logical completion. Failures are inspectable values, not
/// raised faults: a batch driver treats `Unanswered` as "skip this item" and
/// `PromptTooLarge` as "truncate upstream", never as process-fatal.
#[derive(Debug)]
pub enum CompletionOutcome {
    Answered(Completion),
    /// The prompt exceeds the single-request ceiling (pre-flight check), or
    /// the remote service rejected it for size (safety net)
    PromptTooLarge { prompt_tokens: usize, ceiling: usize },
    /// Attempts exhausted, or the failure class is not retryable
    Unanswered {
        attempts: u32,
        last_error: ProviderError,
    },
}

// =============================================================================
// Client
// =============================================================================

/// Performs one logical "generate text for this prompt" operation with
/// bounded retries and correct quota accounting.
pub struct CompletionClient {
    provider: SharedProvider,
    limiter: RateLimiter,
    tokenizer: Tokenizer,
    policy: RetryPolicy,
    max_output_tokens: usize,
    temperature: f32,
    clock: Arc<dyn Clock>,
}

impl CompletionClient {
    pub fn new(
        provider: SharedProvider,
        limiter: RateLimiter,
        tokenizer: Tokenizer,
        policy: RetryPolicy,
        max_output_tokens: usize,
        temperature: f32,
    ) -> Self {
        Self::with_clock(
            provider,
            limiter,
            tokenizer,
            policy,
            max_output_tokens,
            temperature,
            Arc::new(SystemClock),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_clock(
        provider: SharedProvider,
        limiter: RateLimiter,
        tokenizer: Tokenizer,
        policy: RetryPolicy,
        max_output_tokens: usize,
        temperature: f32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            limiter,
            tokenizer,
            policy,
            max_output_tokens,
            temperature,
            clock,
        }
    }

    /// Current limiter state, for inspection and reporting.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Perform one logical completion for `prompt`.
    pub async fn complete(&mut self, prompt: &str) -> CompletionOutcome {
        let prompt_tokens = self.tokenizer.count(prompt);
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            prompt_tokens,
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            // Re-admit on every attempt; the window may have moved while we
            // were backing off
            if let Err(oversized) = self.limiter.admit(prompt_tokens).await {
                warn!(
                    prompt_tokens,
                    ceiling = oversized.ceiling,
                    "prompt exceeds single-request ceiling"
                );
                return CompletionOutcome::PromptTooLarge {
                    prompt_tokens,
                    ceiling: oversized.ceiling,
                };
            }

            debug!(
                attempt,
                max_attempts = self.policy.max_attempts,
                prompt_tokens,
                provider = self.provider.name(),
                "completion attempt"
            );

            match self.provider.complete(&request).await {
                Ok(response) => {
                    let mut usage = response.usage;
                    if usage.total() == 0 {
                        // The service did not report usage; account with our
                        // own counts so the window still fills up
                        usage = TokenUsage {
                            prompt_tokens: prompt_tokens as u32,
                            completion_tokens: self.tokenizer.count(&response.text) as u32,
                        };
                    }
                    self.limiter.record(usage.total() as usize);
                    info!(
                        attempt,
                        total_tokens = usage.total(),
                        "completion succeeded"
                    );
                    return CompletionOutcome::Answered(Completion {
                        text: response.text,
                        usage,
                    });
                }
                Err(error) => {
                    warn!(attempt, kind = %error.kind, "completion attempt failed: {error}");
                    match self.policy.next_step(&error, attempt) {
                        RetryStep::Retry {
                            delay,
                            reset_window,
                        } => {
                            self.clock.sleep(delay).await;
                            if reset_window {
                                // The remote accounting is authoritative
                                // over our local window
                                self.limiter.reset_window();
                            }
                        }
                        RetryStep::TooLarge => {
                            return CompletionOutcome::PromptTooLarge {
                                prompt_tokens,
                                ceiling: self.limiter.ceiling(),
                            };
                        }
                        RetryStep::GiveUp => {
                            return CompletionOutcome::Unanswered {
                                attempts: attempt,
                                last_error: error,
                            };
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
