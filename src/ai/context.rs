//! Context Assembly
//!
//! Builds the question-answering prompt from retrieved passages and
//! per-document condensed summaries under a total token ceiling. Priority
//! order: instruction preamble, one summary per distinct source document (in
//! order of first appearance among the ranked passages), then passages in
//! rank order. Each piece is pre-truncated to its own budget. The per-item
//! budgets can still sum past the global ceiling, so the assembled prompt is
//! re-measured and lowest-ranked passages are dropped first; summaries are
//! only dropped once every passage is gone.

use tracing::{debug, warn};

use crate::ai::tokenizer::Tokenizer;
use crate::config::ContextConfig;
use crate::types::{AssembledContext, RetrievedPassage};

/// Lookup seam for pre-computed condensed summaries. Absence is not an
/// error; a document without a summary simply contributes no summary block.
pub trait SummaryLookup {
    fn summary_for(&self, source_document_id: &str) -> Option<String>;
}

impl SummaryLookup for std::collections::HashMap<String, String> {
    fn summary_for(&self, source_document_id: &str) -> Option<String> {
        self.get(source_document_id).cloned()
    }
}

/// Fixed instruction preamble. Small and constant; not part of the variable
/// budget.
const PREAMBLE: &str = "You are an assistant answering questions about an archive of official documents. \
Base your answer STRICTLY on the summaries and passages provided below. Document-level summaries \
come first, followed by specific retrieved passages. Be direct and factual. If the information \
needed to answer is not present in the provided context, state clearly: 'The provided documents \
do not contain the information needed to answer this question.' Do not invent information or \
assume anything beyond the given text.";

/// Builds one bounded prompt per query.
pub struct ContextAssembler {
    tokenizer: Tokenizer,
    max_prompt_tokens: usize,
    max_passage_tokens: usize,
    max_summary_tokens: usize,
}

impl ContextAssembler {
    pub fn new(tokenizer: Tokenizer, config: &ContextConfig) -> Self {
        // Every budget shrinks when only approximate counts are available
        Self {
            tokenizer,
            max_prompt_tokens: tokenizer.safe_budget(config.max_prompt_tokens),
            max_passage_tokens: tokenizer.safe_budget(config.max_passage_tokens),
            max_summary_tokens: tokenizer.safe_budget(config.max_summary_tokens),
        }
    }

    /// Assemble the prompt for `question` from ranked passages (best first)
    /// and whatever summaries exist for their source documents.
    pub fn assemble(
        &self,
        question: &str,
        passages: &[RetrievedPassage],
        summaries: &dyn SummaryLookup,
    ) -> AssembledContext {
        let mut summary_blocks = Vec::new();
        let mut seen_documents: Vec<&str> = Vec::new();
        for passage in passages {
            if seen_documents.contains(&passage.source_document_id.as_str()) {
                continue;
            }
            seen_documents.push(&passage.source_document_id);
            let Some(summary) = summaries.summary_for(&passage.source_document_id) else {
                continue;
            };
            let text = self.tokenizer.truncate(summary.trim(), self.max_summary_tokens);
            summary_blocks.push(format!(
                "Summary of document '{}':\n{}",
                passage.source_document_id, text
            ));
        }

        let mut passage_blocks = Vec::new();
        for (rank, passage) in passages.iter().enumerate() {
            let text = self
                .tokenizer
                .truncate(passage.text.trim(), self.max_passage_tokens);
            passage_blocks.push(format!(
                "Passage {} (from '{}', id: {}):\n{}",
                rank + 1,
                passage.source_document_id,
                passage.id,
                text
            ));
        }

        let mut prompt = render(question, &summary_blocks, &passage_blocks);
        let mut prompt_tokens = self.tokenizer.count(&prompt);
        while prompt_tokens > self.max_prompt_tokens {
            if passage_blocks.pop().is_some() {
                debug!(
                    prompt_tokens,
                    ceiling = self.max_prompt_tokens,
                    remaining = passage_blocks.len(),
                    "dropping lowest-ranked passage to fit prompt ceiling"
                );
            } else if summary_blocks.pop().is_some() {
                debug!(
                    prompt_tokens,
                    ceiling = self.max_prompt_tokens,
                    "dropping summary to fit prompt ceiling"
                );
            } else {
                // Preamble and question alone exceed the ceiling; the
                // limiter's pre-flight check will surface this as too large
                warn!(
                    prompt_tokens,
                    ceiling = self.max_prompt_tokens,
                    "prompt exceeds ceiling with no context left to drop"
                );
                break;
            }
            prompt = render(question, &summary_blocks, &passage_blocks);
            prompt_tokens = self.tokenizer.count(&prompt);
        }

        AssembledContext {
            prompt,
            prompt_tokens,
        }
    }
}

fn render(question: &str, summaries: &[String], passages: &[String]) -> String {
    let mut sections: Vec<&str> = Vec::new();
    sections.extend(summaries.iter().map(String::as_str));
    if !summaries.is_empty() && !passages.is_empty() {
        sections.push("--- Retrieved passage details ---");
    }
    sections.extend(passages.iter().map(String::as_str));
    let context = sections.join("\n\n");

    format!(
        "{PREAMBLE}\n\nQUESTION:\n{question}\n\n\
         CONTEXT (SUMMARIES AND PASSAGES FROM RELEVANT DOCUMENTS):\n{context}\n\n\
         ANSWER (based only on the context above):"
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn passage(id: &str, source: &str, text: &str, distance: f32) -> RetrievedPassage {
        RetrievedPassage {
            id: id.to_string(),
            source_document_id: source.to_string(),
            text: text.to_string(),
            distance,
        }
    }

    fn assembler(max_prompt_tokens: usize) -> ContextAssembler {
        ContextAssembler::new(
            Tokenizer::new(),
            &ContextConfig {
                max_prompt_tokens,
                max_passage_tokens: 1000,
                max_summary_tokens: 400,
                top_k: 4,
            },
        )
    }

    /// Five ranked passages over three documents, two of which have
    /// summaries.
    fn ranked_fixture() -> (Vec<RetrievedPassage>, HashMap<String, String>) {
        let passages = vec![
            passage("p1", "doc_a", "alpha passage one", 0.10),
            passage("p2", "doc_b", "bravo passage", 0.15),
            passage("p3", "doc_a", "alpha passage two", 0.20),
            passage("p4", "doc_c", "charlie passage", 0.30),
            passage("p5", "doc_b", "bravo passage two", 0.40),
        ];
        let mut summaries = HashMap::new();
        summaries.insert("doc_a".to_string(), "Summary of alpha.".to_string());
        summaries.insert("doc_b".to_string(), "Summary of bravo.".to_string());
        (passages, summaries)
    }

    #[test]
    fn test_summaries_precede_passages() {
        let (passages, summaries) = ranked_fixture();
        let context = assembler(5400).assemble("what changed?", &passages, &summaries);

        let summary_count = context.prompt.matches("Summary of document '").count();
        let passage_count = context.prompt.matches("Passage ").count();
        assert_eq!(summary_count, 2);
        assert_eq!(passage_count, 5);

        // All summary blocks come before the first passage block
        let first_passage = context.prompt.find("Passage 1").unwrap();
        let last_summary = context.prompt.rfind("Summary of document '").unwrap();
        assert!(last_summary < first_passage);
    }

    #[test]
    fn test_one_summary_per_distinct_document_in_first_appearance_order() {
        let (passages, summaries) = ranked_fixture();
        let context = assembler(5400).assemble("q", &passages, &summaries);

        let a = context.prompt.find("Summary of document 'doc_a'").unwrap();
        let b = context.prompt.find("Summary of document 'doc_b'").unwrap();
        assert!(a < b);
        // doc_c has no summary; silently absent
        assert!(!context.prompt.contains("Summary of document 'doc_c'"));
    }

    #[test]
    fn test_missing_summaries_are_not_an_error() {
        let (passages, _) = ranked_fixture();
        let context = assembler(5400).assemble("q", &passages, &HashMap::new());
        assert_eq!(context.prompt.matches("Summary of document '").count(), 0);
        assert_eq!(context.prompt.matches("Passage ").count(), 5);
    }

    #[test]
    fn test_per_passage_truncation() {
        let tokenizer = Tokenizer::new();
        let long_text = "regulation ".repeat(3000);
        let passages = vec![passage("p1", "doc_a", &long_text, 0.1)];
        let context = assembler(5400).assemble("q", &passages, &HashMap::new());

        // The passage block carries at most its own ceiling, not the whole
        // document
        assert!(tokenizer.count(&context.prompt) < 1200);
    }

    #[test]
    fn test_global_ceiling_drops_lowest_ranked_passage_first() {
        let (passages, summaries) = ranked_fixture();
        let roomy = assembler(5400).assemble("q", &passages, &summaries);
        // Pick a ceiling below the full prompt but above it minus one passage
        let ceiling = roomy.prompt_tokens - 5;
        let context = assembler(ceiling).assemble("q", &passages, &summaries);

        assert!(context.prompt_tokens <= ceiling);
        assert_eq!(context.prompt.matches("Summary of document '").count(), 2);
        assert!(context.prompt.matches("Passage ").count() < 5);
        // The best-ranked passage survives
        assert!(context.prompt.contains("Passage 1"));
        assert!(!context.prompt.contains("Passage 5"));
    }

    #[test]
    fn test_every_passage_dropped_before_any_summary() {
        // Passages carry ~100 tokens each, so once the ceiling is tight no
        // single passage can fit alongside the two short summaries
        let body = "word ".repeat(100);
        let passages = vec![
            passage("p1", "doc_a", &body, 0.1),
            passage("p2", "doc_b", &body, 0.2),
            passage("p3", "doc_c", &body, 0.3),
        ];
        let (_, summaries) = ranked_fixture();

        let base = assembler(5400).assemble("q", &[], &HashMap::new()).prompt_tokens;
        let ceiling = base + 60;
        let context = assembler(ceiling).assemble("q", &passages, &summaries);

        assert!(context.prompt_tokens <= ceiling);
        assert_eq!(
            context.prompt.matches("Passage ").count(),
            0,
            "passages must be shed before summaries"
        );
        assert_eq!(context.prompt.matches("Summary of document '").count(), 2);
    }

    #[test]
    fn test_measured_count_matches_tokenizer() {
        let (passages, summaries) = ranked_fixture();
        let tokenizer = Tokenizer::new();
        let context = assembler(5400).assemble("q", &passages, &summaries);
        assert_eq!(context.prompt_tokens, tokenizer.count(&context.prompt));
    }

    #[test]
    fn test_no_passages_still_renders_question() {
        let context = assembler(5400).assemble("what is decree 47?", &[], &HashMap::new());
        assert!(context.prompt.contains("what is decree 47?"));
        assert!(context.prompt_tokens > 0);
    }
}
