//! Index Command
//!
//! Chunk every document and hand the chunks to the similarity-search
//! service for embedding and indexing.

use crate::ai::{Chunker, Tokenizer};
use crate::config::Config;
use crate::pipeline;
use crate::retrieval::HttpSimilarityStore;
use crate::storage::DocumentStore;
use crate::types::Result;

pub async fn run(config: &Config) -> Result<()> {
    let tokenizer = Tokenizer::new();
    let documents = DocumentStore::new(&config.paths.documents_dir);
    let store = HttpSimilarityStore::new(&config.retrieval.endpoint, config.retrieval.timeout_secs)?;
    let chunker = Chunker::new(
        tokenizer,
        config.chunking.chunk_size,
        config.chunking.overlap,
    );

    let report = pipeline::index_corpus(&documents, &store, &chunker).await?;

    println!("Documents indexed:  {}", report.documents);
    println!("Chunks indexed:     {}", report.chunks);
    println!("Empty documents:    {}", report.skipped_empty);
    println!("Failed:             {}", report.failed);
    Ok(())
}
