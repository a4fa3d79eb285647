//! Document Chunking
//!
//! Splits a document's token sequence into overlapping windows bounded by
//! `chunk_size` tokens. The document is encoded once; a sliding window walks
//! the sequence, decoding each span back to text. Consecutive chunks share
//! `overlap` tokens so passage boundaries do not cut evidence in half.

use crate::ai::tokenizer::{TokenSequence, Tokenizer};
use crate::types::Chunk;

/// Sliding-window chunker. Cheap to construct; one instance can chunk any
/// number of documents.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    tokenizer: Tokenizer,
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` is expected to be smaller than `chunk_size` (enforced by
    /// config validation); if it is not, the window advances a full step at
    /// a time, trading overlap away for guaranteed termination.
    pub fn new(tokenizer: Tokenizer, chunk_size: usize, overlap: usize) -> Self {
        debug_assert!(chunk_size > 0, "chunk_size must be positive");
        Self {
            tokenizer,
            chunk_size,
            overlap,
        }
    }

    /// Chunk one document into a lazy, finite sequence of write-once chunks.
    ///
    /// An empty or whitespace-only document yields nothing. The iterator is
    /// not restartable; call `chunk` again with the same document to produce
    /// the sequence a second time.
    pub fn chunk(&self, source_id: &str, text: &str) -> Chunks {
        let sequence = if text.trim().is_empty() {
            TokenSequence::Words(Vec::new())
        } else {
            self.tokenizer.sequence(text)
        };
        Chunks {
            sequence,
            source_id: source_id.to_string(),
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            offset: 0,
            index: 0,
            done: false,
        }
    }
}

/// Lazy iterator over a single document's chunks.
pub struct Chunks {
    sequence: TokenSequence,
    source_id: String,
    chunk_size: usize,
    overlap: usize,
    offset: usize,
    index: usize,
    done: bool,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            if self.done || self.sequence.is_empty() {
                return None;
            }

            let end = (self.offset + self.chunk_size).min(self.sequence.len());
            let text = self.sequence.decode_span(self.offset, end);
            let token_count = end - self.offset;

            if end == self.sequence.len() {
                self.done = true;
            } else {
                let advance = self.chunk_size.saturating_sub(self.overlap);
                // overlap >= chunk_size would stall the window; consume the
                // remainder in full steps instead of looping forever
                self.offset = if advance == 0 { end } else { self.offset + advance };
            }

            // Decoded spans can land on pure whitespace; skip them without
            // burning an index
            if text.trim().is_empty() {
                continue;
            }

            let chunk = Chunk {
                source_id: self.source_id.clone(),
                index: self.index,
                text,
                token_count,
            };
            self.index += 1;
            return Some(chunk);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn exact_tokenizer() -> Tokenizer {
        let tokenizer = Tokenizer::new();
        assert!(!tokenizer.is_approximate(), "tests need the real encoding");
        tokenizer
    }

    /// A document of exactly `n` cl100k tokens: "a" followed by `n - 1`
    /// repetitions of " a", each a single token.
    fn doc_with_tokens(n: usize) -> String {
        let mut text = String::from("a");
        for _ in 1..n {
            text.push_str(" a");
        }
        text
    }

    #[test]
    fn test_doc_with_tokens_helper() {
        let tokenizer = exact_tokenizer();
        assert_eq!(tokenizer.count(&doc_with_tokens(2300)), 2300);
    }

    #[test]
    fn test_window_scenario() {
        // 2300 tokens, chunk_size 1000, overlap 150: windows start at
        // 0, 850, 1700 with sizes 1000, 1000, 600
        let chunker = Chunker::new(exact_tokenizer(), 1000, 150);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", &doc_with_tokens(2300)).collect();

        let sizes: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        assert_eq!(sizes, vec![1000, 1000, 600]);

        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_last_window_reaches_sequence_end() {
        let tokenizer = exact_tokenizer();
        let chunker = Chunker::new(tokenizer, 1000, 150);
        let text = doc_with_tokens(2600);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", &text).collect();

        // Starts at 0, 850, 1700; the final window is clipped to the end
        let sizes: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        assert_eq!(sizes, vec![1000, 1000, 900]);

        let total = tokenizer.count(&text);
        let overlap_repeats = 150 * (chunks.len() - 1);
        assert_eq!(sizes.iter().sum::<usize>(), total + overlap_repeats);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap_text() {
        let chunker = Chunker::new(exact_tokenizer(), 1000, 150);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", &doc_with_tokens(2300)).collect();

        // The last 150 tokens of one window are the first 150 of the next;
        // for this document that is the text " a" * 150
        let shared = " a".repeat(150);
        assert!(chunks[0].text.ends_with(&shared));
        assert!(chunks[1].text[1..].starts_with(&shared[1..]));
    }

    #[test]
    fn test_zero_overlap_concatenation_is_exact() {
        let tokenizer = exact_tokenizer();
        let chunker = Chunker::new(tokenizer, 7, 0);
        let text = "The council resolved to publish the annual budget in March.";
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", text).collect();

        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);

        let total: usize = chunks.iter().map(|c| c.token_count).sum();
        assert_eq!(total, tokenizer.count(text));
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let chunker = Chunker::new(exact_tokenizer(), 1000, 150);
        assert_eq!(chunker.chunk("doc_a", "").count(), 0);
        assert_eq!(chunker.chunk("doc_a", "   \n\t  ").count(), 0);
    }

    #[test]
    fn test_document_smaller_than_window() {
        let chunker = Chunker::new(exact_tokenizer(), 1000, 150);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", "just a few tokens").collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "just a few tokens");
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_terminates() {
        let chunker = Chunker::new(exact_tokenizer(), 10, 10);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", &doc_with_tokens(35)).collect();
        // Advance clamps to the window end: disjoint full steps
        let sizes: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        assert_eq!(sizes, vec![10, 10, 10, 5]);
    }

    #[test]
    fn test_chunk_ids_are_stable_across_runs() {
        let chunker = Chunker::new(exact_tokenizer(), 10, 2);
        let text = doc_with_tokens(25);
        let first: Vec<String> = chunker.chunk("doc_a", &text).map(|c| c.id()).collect();
        let second: Vec<String> = chunker.chunk("doc_a", &text).map(|c| c.id()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_approximate_mode_chunks_by_words() {
        let chunker = Chunker::new(Tokenizer::approximate(), 3, 1);
        let chunks: Vec<Chunk> = chunker.chunk("doc_a", "one two three four five").collect();
        assert_eq!(chunks[0].text, "one two three");
        assert_eq!(chunks[1].text, "three four five");
    }

    proptest! {
        /// Window coverage invariant: every token is covered and each
        /// consecutive pair of chunks repeats exactly `overlap` tokens.
        #[test]
        fn prop_window_sizes_account_for_every_token(
            words in 1usize..400,
            chunk_size in 2usize..60,
            overlap_fraction in 0usize..100,
        ) {
            let overlap = overlap_fraction * (chunk_size - 1) / 100;
            let tokenizer = exact_tokenizer();
            let text = doc_with_tokens(words);
            let chunker = Chunker::new(tokenizer, chunk_size, overlap);
            let chunks: Vec<Chunk> = chunker.chunk("doc", &text).collect();

            let total = tokenizer.count(&text);
            let sum: usize = chunks.iter().map(|c| c.token_count).sum();
            prop_assert_eq!(sum, total + overlap * (chunks.len() - 1));
            prop_assert!(chunks.iter().all(|c| c.token_count <= chunk_size));
        }
    }
}
