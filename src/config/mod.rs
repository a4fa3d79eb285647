//! Configuration
//!
//! Layered configuration for quotas, chunking, context budgets, and the
//! remote collaborators.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    ChunkingConfig, Config, ContextConfig, LimitsConfig, LlmConfig, PathsConfig, RetrievalConfig,
    RetryConfig, SummarizeConfig,
};
