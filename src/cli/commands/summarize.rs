//! Summarize Command
//!
//! Generate a condensed summary for every document in the corpus that does
//! not already have one.

use crate::ai::Tokenizer;
use crate::config::Config;
use crate::pipeline;
use crate::storage::{DocumentStore, SummaryStore};
use crate::types::Result;

pub async fn run(config: &Config, force: bool) -> Result<()> {
    let tokenizer = Tokenizer::new();
    let documents = DocumentStore::new(&config.paths.documents_dir);
    let summaries = SummaryStore::new(&config.paths.summaries_dir);
    let mut client = super::build_client(config, tokenizer)?;

    let report = pipeline::summarize_corpus(
        &documents,
        &summaries,
        &mut client,
        tokenizer,
        config.summarize.max_document_tokens,
        force,
    )
    .await?;

    println!("Summaries written:   {}", report.summarized);
    println!("Already summarized:  {}", report.skipped_existing);
    println!("Empty documents:     {}", report.skipped_empty);
    println!("Failed:              {}", report.failed);
    Ok(())
}
