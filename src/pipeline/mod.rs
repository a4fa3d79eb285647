//! Batch Pipelines
//!
//! Sequential drivers that tie the stores, chunker, and completion client
//! together. One document or one query is processed fully before the next
//! begins; the only suspension points are the limiter's rollover wait, retry
//! backoff, and a randomized courtesy pause between consecutive remote
//! calls. Per-item failures are logged and skipped so a batch run always
//! reaches the end of the corpus.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::ai::{Chunker, CompletionClient, CompletionOutcome, ContextAssembler, SummaryLookup, Tokenizer};
use crate::constants::batch;
use crate::retrieval::SimilarityStore;
use crate::storage::{DocumentStore, SummaryStore};
use crate::types::{Chunk, Result, RetrievedPassage};

/// Randomized pause between consecutive remote calls, so a batch run does
/// not burst the upstream service.
pub async fn courtesy_pause() {
    let secs = rand::rng().random_range(batch::PAUSE_MIN_SECS..batch::PAUSE_MAX_SECS);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

// =============================================================================
// Summarize
// =============================================================================

/// Outcome counts for a summarize run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SummarizeReport {
    pub summarized: usize,
    pub skipped_existing: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

fn summary_prompt(document_text: &str) -> String {
    format!(
        "You are an assistant specialized in extracting the key information from official \
         documents. Write a very concise single-paragraph summary capturing the essence and the \
         most important points of the following document. Avoid introductory phrases like 'The \
         document discusses...'; go directly to the facts and the main purpose.\n\n\
         --- DOCUMENT START ---\n{document_text}\n--- DOCUMENT END ---\n\n\
         CONCISE ONE-PARAGRAPH SUMMARY:"
    )
}

/// Generate a condensed summary for every document that does not have one.
pub async fn summarize_corpus(
    documents: &DocumentStore,
    summaries: &SummaryStore,
    client: &mut CompletionClient,
    tokenizer: Tokenizer,
    max_document_tokens: usize,
    force: bool,
) -> Result<SummarizeReport> {
    let names = documents.list()?;
    let total = names.len();
    info!(count = total, "summarizing corpus");

    let mut report = SummarizeReport::default();
    for (i, name) in names.iter().enumerate() {
        let document = match documents.load(name) {
            Ok(document) => document,
            Err(e) => {
                warn!("skipping '{name}': {e}");
                report.failed += 1;
                continue;
            }
        };

        if document.body.is_empty() {
            debug!(document = %document.id, "empty body, skipping");
            report.skipped_empty += 1;
            continue;
        }
        if !force && summaries.exists(&document.id) {
            debug!(document = %document.id, "summary already exists, skipping");
            report.skipped_existing += 1;
            continue;
        }

        info!(document = %document.id, "summarizing ({}/{})", i + 1, total);
        let text = tokenizer.truncate(&document.body, tokenizer.safe_budget(max_document_tokens));
        match client.complete(&summary_prompt(&text)).await {
            CompletionOutcome::Answered(completion) if !completion.text.is_empty() => {
                summaries.put(&document.id, &completion.text)?;
                report.summarized += 1;
            }
            CompletionOutcome::Answered(_) => {
                warn!(document = %document.id, "model returned an empty summary");
                report.failed += 1;
            }
            CompletionOutcome::PromptTooLarge {
                prompt_tokens,
                ceiling,
            } => {
                warn!(
                    document = %document.id,
                    prompt_tokens,
                    ceiling,
                    "document prompt too large even after truncation"
                );
                report.failed += 1;
            }
            CompletionOutcome::Unanswered {
                attempts,
                last_error,
            } => {
                warn!(document = %document.id, attempts, "summary not generated: {last_error}");
                report.failed += 1;
            }
        }

        if i + 1 < total {
            courtesy_pause().await;
        }
    }

    info!(?report, "summarize run finished");
    Ok(report)
}

// =============================================================================
// Index
// =============================================================================

/// Outcome counts for an index run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

/// Chunk every document and hand the chunks to the similarity collaborator.
pub async fn index_corpus(
    documents: &DocumentStore,
    store: &dyn SimilarityStore,
    chunker: &Chunker,
) -> Result<IndexReport> {
    let names = documents.list()?;
    info!(count = names.len(), "indexing corpus");

    let mut report = IndexReport::default();
    for name in &names {
        let document = match documents.load(name) {
            Ok(document) => document,
            Err(e) => {
                warn!("skipping '{name}': {e}");
                report.failed += 1;
                continue;
            }
        };

        let chunks: Vec<Chunk> = chunker.chunk(&document.id, &document.body).collect();
        if chunks.is_empty() {
            debug!(document = %document.id, "no chunks, skipping");
            report.skipped_empty += 1;
            continue;
        }

        match store.index(&chunks).await {
            Ok(accepted) => {
                info!(document = %document.id, chunks = accepted, "indexed");
                report.documents += 1;
                report.chunks += accepted;
            }
            Err(e) => {
                warn!(document = %document.id, "indexing failed: {e}");
                report.failed += 1;
            }
        }
    }

    info!(?report, "index run finished");
    Ok(report)
}

// =============================================================================
// Answer
// =============================================================================

/// Result of answering one question.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The similarity store returned nothing useful
    NoPassages,
    /// Context was assembled and a completion was attempted
    Completed {
        passages: Vec<RetrievedPassage>,
        /// Measured token count of the assembled prompt
        context_tokens: usize,
        outcome: CompletionOutcome,
    },
}

/// Retrieve, assemble, and complete one question.
pub async fn answer_question(
    question: &str,
    store: &dyn SimilarityStore,
    summaries: &dyn SummaryLookup,
    assembler: &ContextAssembler,
    client: &mut CompletionClient,
    top_k: usize,
) -> Result<QueryOutcome> {
    let passages = store.search(question, top_k).await?;
    if passages.is_empty() {
        return Ok(QueryOutcome::NoPassages);
    }

    let context = assembler.assemble(question, &passages, summaries);
    debug!(prompt_tokens = context.prompt_tokens, "assembled context");

    let outcome = client.complete(&context.prompt).await;
    Ok(QueryOutcome::Completed {
        passages,
        context_tokens: context.prompt_tokens,
        outcome,
    })
}

// =============================================================================
// Tests
// =============================================================================
