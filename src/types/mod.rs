pub mod document;
pub mod error;

pub use document::{AssembledContext, Chunk, RetrievedPassage, chunk_id};
pub use error::{DocloomError, ProviderError, ProviderErrorKind, Result};
