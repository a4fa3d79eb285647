//! docloom - Token-Budgeted Question Answering over Document Archives
//!
//! docloom chunks plain-text documents into overlapping token windows, hands
//! them to an external similarity-search service, generates per-document
//! condensed summaries through a rate-limited completion service, and
//! assembles retrieved passages and summaries into token-budgeted prompts
//! for question answering.
//!
//! ## Core Components
//!
//! - **Tokenizer**: exact token accounting with an approximate fallback
//! - **Chunker**: overlapping sliding windows over a document's tokens
//! - **RateLimiter**: one-minute RPM/TPM window guarding the remote service
//! - **CompletionClient**: bounded retries with per-failure-class backoff
//! - **ContextAssembler**: priority-ordered, ceiling-capped prompt assembly
//!
//! ## Quick Start
//!
//! ```ignore
//! use docloom::{Config, Tokenizer, Chunker};
//!
//! let config = Config::default();
//! let tokenizer = Tokenizer::new();
//! let chunker = Chunker::new(tokenizer, config.chunking.chunk_size, config.chunking.overlap);
//! for chunk in chunker.chunk("decree_47", "full document text") {
//!     println!("{} [{} tokens]", chunk.id(), chunk.token_count);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: tokenizer, chunker, rate limiter, completion client, context
//!   assembler
//! - [`retrieval`]: opaque similarity-search collaborator
//! - [`storage`]: plain-text document and summary stores
//! - [`pipeline`]: sequential batch drivers
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod retrieval;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use ai::{
    Chunker, CompletionClient, CompletionOutcome, ContextAssembler, RateLimiter, RetryPolicy,
    Tokenizer,
};
pub use config::{Config, ConfigLoader};
pub use pipeline::{IndexReport, QueryOutcome, SummarizeReport};
pub use retrieval::{HttpSimilarityStore, SimilarityStore};
pub use storage::{DocumentStore, SummaryStore};
pub use types::{Chunk, DocloomError, Result, RetrievedPassage};
