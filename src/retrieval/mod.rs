//! Similarity-Search Collaborator
//!
//! The pipeline treats the embedding/similarity store as an opaque
//! ranked-list provider: chunks go in, ranked passages come out. Index
//! construction and maintenance are the external service's concern. Records
//! crossing the boundary are validated and invalid ones dropped with a
//! warning rather than poisoning downstream assembly.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::types::{Chunk, DocloomError, Result, RetrievedPassage};

// =============================================================================
// Trait
// =============================================================================

#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Hand a batch of chunks to the store for embedding and indexing.
    /// Returns the number of chunks accepted.
    async fn index(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Return up to `k` passages ranked by similarity to `query`, best
    /// first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>>;
}

/// Drop records that would poison downstream assembly.
pub fn validate_passages(raw: Vec<RetrievedPassage>) -> Vec<RetrievedPassage> {
    let total = raw.len();
    let passages: Vec<_> = raw.into_iter().filter(RetrievedPassage::is_valid).collect();
    if passages.len() < total {
        warn!(
            dropped = total - passages.len(),
            "similarity store returned invalid passage records"
        );
    }
    passages
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Thin HTTP client for an external similarity-search service.
pub struct HttpSimilarityStore {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSimilarityStore {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        // Parse early so a bad endpoint fails at construction, not mid-batch
        Url::parse(endpoint).map_err(|e| {
            DocloomError::Config(format!("invalid similarity store endpoint '{endpoint}': {e}"))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocloomError::Retrieval(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

/// Wire form of a chunk, carrying its derived identity.
#[derive(Serialize)]
struct ChunkRecord<'a> {
    id: String,
    source_document_id: &'a str,
    index: usize,
    text: &'a str,
    token_count: usize,
}

impl<'a> From<&'a Chunk> for ChunkRecord<'a> {
    fn from(chunk: &'a Chunk) -> Self {
        Self {
            id: chunk.id(),
            source_document_id: &chunk.source_id,
            index: chunk.index,
            text: &chunk.text,
            token_count: chunk.token_count,
        }
    }
}

#[async_trait]
impl SimilarityStore for HttpSimilarityStore {
    async fn index(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let records: Vec<ChunkRecord> = chunks.iter().map(ChunkRecord::from).collect();

        let response = self
            .client
            .post(self.url("chunks"))
            .json(&records)
            .send()
            .await
            .map_err(|e| DocloomError::Retrieval(format!("indexing request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocloomError::Retrieval(format!(
                "similarity store rejected chunk batch ({status}): {body}"
            )));
        }

        debug!(count = chunks.len(), "indexed chunk batch");
        Ok(chunks.len())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let response = self
            .client
            .post(self.url("search"))
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| DocloomError::Retrieval(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocloomError::Retrieval(format!(
                "similarity store search failed ({status}): {body}"
            )));
        }

        let raw: Vec<RetrievedPassage> = response
            .json()
            .await
            .map_err(|e| DocloomError::Retrieval(format!("malformed search response: {e}")))?;

        Ok(validate_passages(raw))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, text: &str, distance: f32) -> RetrievedPassage {
        RetrievedPassage {
            id: id.to_string(),
            source_document_id: "doc_a".to_string(),
            text: text.to_string(),
            distance,
        }
    }

    #[test]
    fn test_validate_passages_drops_invalid_records() {
        let raw = vec![
            passage("p1", "good text", 0.1),
            passage("p2", "   ", 0.2),
            passage("p3", "more text", f32::NAN),
            passage("", "orphan", 0.3),
            passage("p5", "kept", 0.4),
        ];
        let valid = validate_passages(raw);
        let ids: Vec<&str> = valid.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p5"]);
    }

    #[test]
    fn test_store_rejects_malformed_endpoint() {
        assert!(HttpSimilarityStore::new("not a url", 30).is_err());
        assert!(HttpSimilarityStore::new("http://127.0.0.1:8750", 30).is_ok());
    }

    #[test]
    fn test_endpoint_trailing_slash_normalized() {
        let store = HttpSimilarityStore::new("http://127.0.0.1:8750/", 30).unwrap();
        assert_eq!(store.url("search"), "http://127.0.0.1:8750/search");
    }

    #[test]
    fn test_chunk_record_carries_derived_id() {
        let chunk = Chunk {
            source_id: "doc_a".to_string(),
            index: 3,
            text: "body".to_string(),
            token_count: 2,
        };
        let record = ChunkRecord::from(&chunk);
        assert_eq!(record.id, chunk.id());
        assert_eq!(record.index, 3);
    }
}
