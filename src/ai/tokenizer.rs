//! Token Counting and Truncation
//!
//! Exact token accounting with tiktoken's `cl100k_base` encoding, used by
//! every budget decision in the pipeline. When the encoder cannot be
//! initialized the counter degrades to whitespace-word counting and flags
//! itself approximate. Approximate counts are not a safe upper bound, so
//! callers shrink their budgets through [`Tokenizer::safe_budget`].

use std::sync::OnceLock;

use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::warn;

use crate::constants::tokenizer::APPROXIMATE_MARGIN;

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so it is created once and shared by every `Tokenizer` instance.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!("failed to initialize cl100k_base encoder, falling back to word counts: {e}");
                None
            }
        })
        .as_ref()
}

/// Token counter backed by `cl100k_base`, with a word-count fallback.
#[derive(Clone, Copy)]
pub struct Tokenizer {
    bpe: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("approximate", &self.is_approximate())
            .finish()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self { bpe: encoder() }
    }

    /// Word-counting tokenizer, as used when the codec is unavailable.
    pub fn approximate() -> Self {
        Self { bpe: None }
    }

    /// Whether counts come from the word-count fallback rather than the
    /// real encoding.
    pub fn is_approximate(&self) -> bool {
        self.bpe.is_none()
    }

    /// Count tokens in `text`. Approximate mode counts whitespace-delimited
    /// words.
    pub fn count(&self, text: &str) -> usize {
        match self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.split_whitespace().count(),
        }
    }

    /// Shrink a token budget when only approximate counts are available.
    /// Exact mode returns the budget unchanged.
    pub fn safe_budget(&self, budget: usize) -> usize {
        if self.is_approximate() {
            budget - (budget as f64 * APPROXIMATE_MARGIN) as usize
        } else {
            budget
        }
    }

    /// Return a prefix of `text` whose token count is at most `max_tokens`.
    ///
    /// Exact mode truncates on token boundaries and decodes back to text,
    /// which may normalize trailing whitespace; approximate mode keeps whole
    /// words.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        match self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_ordinary(text);
                if tokens.len() <= max_tokens {
                    return text.to_string();
                }
                match bpe.decode(tokens[..max_tokens].to_vec()) {
                    Ok(prefix) => prefix,
                    Err(e) => {
                        // Token-boundary decode can fail on split multi-byte
                        // sequences; fall back to a character prefix
                        warn!("truncation decode failed, using character prefix: {e}");
                        text.chars().take(max_tokens * 3).collect()
                    }
                }
            }
            None => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.len() <= max_tokens {
                    text.to_string()
                } else {
                    words[..max_tokens].join(" ")
                }
            }
        }
    }

    /// Encode a whole document once for chunking.
    pub fn sequence(&self, text: &str) -> TokenSequence {
        match self.bpe {
            Some(bpe) => TokenSequence::Exact {
                bpe,
                tokens: bpe.encode_ordinary(text),
            },
            None => TokenSequence::Words(
                text.split_whitespace().map(str::to_string).collect(),
            ),
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Token Sequence
// =============================================================================

/// A document's full token sequence, sliceable back into text.
///
/// `decode_span(0, len)` reproduces the document text exactly in exact mode
/// and up to whitespace normalization in word mode.
pub enum TokenSequence {
    Exact {
        bpe: &'static CoreBPE,
        tokens: Vec<u32>,
    },
    Words(Vec<String>),
}

impl TokenSequence {
    pub fn len(&self) -> usize {
        match self {
            Self::Exact { tokens, .. } => tokens.len(),
            Self::Words(words) => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the token span `[start, end)` back into text.
    pub fn decode_span(&self, start: usize, end: usize) -> String {
        match self {
            Self::Exact { bpe, tokens } => match bpe.decode(tokens[start..end].to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("token span [{start}, {end}) did not decode cleanly: {e}");
                    String::new()
                }
            },
            Self::Words(words) => words[start..end].join(" "),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_simple_text() {
        let tokenizer = Tokenizer::new();
        assert_eq!(tokenizer.count(""), 0);
        let tokens = tokenizer.count("The quick brown fox jumps over the lazy dog.");
        assert!(tokens >= 5);
        assert!(tokens <= 20);
    }

    #[test]
    fn test_count_is_deterministic() {
        let tokenizer = Tokenizer::new();
        let text = "Decree 47/2024 amends the customs regulation.";
        assert_eq!(tokenizer.count(text), tokenizer.count(text));
    }

    #[test]
    fn test_truncate_within_budget_is_identity() {
        let tokenizer = Tokenizer::new();
        let text = "short text";
        assert_eq!(tokenizer.truncate(text, 1000), text);
    }

    #[test]
    fn test_truncate_respects_budget() {
        let tokenizer = Tokenizer::new();
        let text = "word ".repeat(500);
        let truncated = tokenizer.truncate(&text, 100);
        assert!(tokenizer.count(&truncated) <= 100);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn test_approximate_counts_words() {
        let tokenizer = Tokenizer::approximate();
        assert!(tokenizer.is_approximate());
        assert_eq!(tokenizer.count("one two three"), 3);
        assert_eq!(tokenizer.count("  spaced   out  "), 2);
    }

    #[test]
    fn test_approximate_truncate_keeps_whole_words() {
        let tokenizer = Tokenizer::approximate();
        assert_eq!(tokenizer.truncate("one two three four", 2), "one two");
        assert_eq!(tokenizer.truncate("one two", 5), "one two");
    }

    #[test]
    fn test_safe_budget_shrinks_only_in_approximate_mode() {
        assert_eq!(Tokenizer::new().safe_budget(1000), 1000);
        assert_eq!(Tokenizer::approximate().safe_budget(1000), 900);
    }

    #[test]
    fn test_sequence_roundtrip() {
        let tokenizer = Tokenizer::new();
        let text = "The archive contains decrees, notices and resolutions.";
        let sequence = tokenizer.sequence(text);
        assert_eq!(sequence.len(), tokenizer.count(text));
        assert_eq!(sequence.decode_span(0, sequence.len()), text);
    }

    #[test]
    fn test_sequence_span_concatenation() {
        let tokenizer = Tokenizer::new();
        let text = "a b c d e f g h i j k l m n o p";
        let sequence = tokenizer.sequence(text);
        let mid = sequence.len() / 2;
        let joined = format!(
            "{}{}",
            sequence.decode_span(0, mid),
            sequence.decode_span(mid, sequence.len())
        );
        assert_eq!(joined, text);
    }

    #[test]
    fn test_word_sequence_joins_with_spaces() {
        let tokenizer = Tokenizer::approximate();
        let sequence = tokenizer.sequence("uno  dos\ntres");
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.decode_span(0, 2), "uno dos");
    }
}
