//! Pipeline Records
//!
//! Structured records exchanged between pipeline stages and collaborators.
//! Passage records arriving from the similarity store are validated at the
//! boundary; everything else is constructed internally.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Chunk
// =============================================================================

/// A bounded, token-limited contiguous slice of one document's text.
///
/// Created by the chunker and never mutated afterwards. Chunks are ordered by
/// `index` within a `source_id`; consecutive chunks share the configured
/// token overlap.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Identifier of the source document
    pub source_id: String,
    /// Position of this chunk within the document, starting at 0
    pub index: usize,
    pub text: String,
    /// Tokens in the window this chunk was cut from
    pub token_count: usize,
}

impl Chunk {
    /// Deterministic chunk identity. Re-ingesting the same document with the
    /// same parameters yields the same ids even if the extracted text
    /// changed upstream.
    pub fn id(&self) -> String {
        chunk_id(&self.source_id, self.index)
    }
}

/// Identity derived from `(source document, index)`: an 8-hex digest prefix
/// of the source id plus the fragment position.
pub fn chunk_id(source_id: &str, index: usize) -> String {
    let digest = Sha256::digest(source_id.as_bytes());
    let prefix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}-{index}")
}

// =============================================================================
// Retrieved Passage
// =============================================================================

/// Ranked text fragment returned by the similarity-search collaborator.
/// Read-only input to context assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub source_document_id: String,
    pub text: String,
    /// Similarity distance, smaller is better
    pub distance: f32,
}

impl RetrievedPassage {
    /// Boundary validation for records arriving from the external store.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.source_document_id.is_empty()
            && !self.text.trim().is_empty()
            && self.distance.is_finite()
    }
}

// =============================================================================
// Assembled Context
// =============================================================================

/// Prompt produced by the context assembler, consumed exactly once per query.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub prompt: String,
    /// Measured token count of the whole prompt, for reporting and for the
    /// rate limiter's admission check
    pub prompt_tokens: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_deterministic() {
        assert_eq!(chunk_id("doc_a", 0), chunk_id("doc_a", 0));
        assert_ne!(chunk_id("doc_a", 0), chunk_id("doc_a", 1));
        assert_ne!(chunk_id("doc_a", 0), chunk_id("doc_b", 0));
    }

    #[test]
    fn test_chunk_id_format() {
        let id = chunk_id("decree_2024_001", 7);
        let (prefix, index) = id.split_once('-').expect("id has a dash");
        assert_eq!(prefix.len(), 8);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(index, "7");
    }

    #[test]
    fn test_passage_validation() {
        let good = RetrievedPassage {
            id: "ab12cd34-0".to_string(),
            source_document_id: "doc_a".to_string(),
            text: "some text".to_string(),
            distance: 0.42,
        };
        assert!(good.is_valid());

        let empty_text = RetrievedPassage {
            text: "   ".to_string(),
            ..good.clone()
        };
        assert!(!empty_text.is_valid());

        let bad_distance = RetrievedPassage {
            distance: f32::NAN,
            ..good.clone()
        };
        assert!(!bad_distance.is_valid());

        let no_source = RetrievedPassage {
            source_document_id: String::new(),
            ..good
        };
        assert!(!no_source.is_valid());
    }
}
