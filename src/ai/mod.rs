//! AI Integration Layer
//!
//! Token accounting, chunking, quota management, and the resilient
//! completion pipeline.

pub mod chunker;
pub mod client;
pub mod context;
pub mod limiter;
pub mod provider;
pub mod tokenizer;

pub use chunker::{Chunker, Chunks};
pub use client::{Completion, CompletionClient, CompletionOutcome, RetryPolicy};
pub use context::{ContextAssembler, SummaryLookup};
pub use limiter::{Clock, OversizedRequest, RateLimiter, RateWindow, SystemClock};
pub use provider::{
    CompletionProvider, CompletionRequest, OpenAiCompatProvider, ProviderResponse, SharedProvider,
    TokenUsage, create_provider,
};
pub use tokenizer::{TokenSequence, Tokenizer};
