//! Ask Command
//!
//! One-shot or interactive question answering over the indexed corpus.

use std::io::{self, BufRead, Write};

use console::style;

use crate::ai::{CompletionClient, CompletionOutcome, ContextAssembler, Tokenizer};
use crate::config::Config;
use crate::pipeline::{self, QueryOutcome};
use crate::retrieval::{HttpSimilarityStore, SimilarityStore};
use crate::storage::SummaryStore;
use crate::types::{Result, RetrievedPassage};

pub async fn run(config: &Config, question: Option<String>, show_passages: bool) -> Result<()> {
    let tokenizer = Tokenizer::new();
    let store = HttpSimilarityStore::new(&config.retrieval.endpoint, config.retrieval.timeout_secs)?;
    let summaries = SummaryStore::new(&config.paths.summaries_dir);
    let assembler = ContextAssembler::new(tokenizer, &config.context);
    let mut client = super::build_client(config, tokenizer)?;
    let top_k = config.context.top_k;

    match question {
        Some(question) => {
            answer_one(
                &question,
                &store,
                &summaries,
                &assembler,
                &mut client,
                top_k,
                show_passages,
            )
            .await
        }
        None => {
            println!("Enter a question (or 'exit'):");
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                print!("> ");
                io::stdout().flush()?;
                line.clear();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") {
                    break;
                }
                answer_one(
                    question,
                    &store,
                    &summaries,
                    &assembler,
                    &mut client,
                    top_k,
                    show_passages,
                )
                .await?;
                pipeline::courtesy_pause().await;
            }
            Ok(())
        }
    }
}

async fn answer_one(
    question: &str,
    store: &dyn SimilarityStore,
    summaries: &SummaryStore,
    assembler: &ContextAssembler,
    client: &mut CompletionClient,
    top_k: usize,
    show_passages: bool,
) -> Result<()> {
    match pipeline::answer_question(question, store, summaries, assembler, client, top_k).await? {
        QueryOutcome::NoPassages => {
            println!("No relevant passages were found for this question.");
        }
        QueryOutcome::Completed {
            passages,
            context_tokens,
            outcome,
        } => {
            println!();
            match outcome {
                CompletionOutcome::Answered(completion) => {
                    println!("{}", style("Answer").bold());
                    println!("{}", "=".repeat(50));
                    println!("{}", completion.text);
                    println!("{}", "=".repeat(50));
                    println!(
                        "{}",
                        style(format!(
                            "prompt: {} tokens, completion: {} tokens",
                            completion.usage.prompt_tokens, completion.usage.completion_tokens
                        ))
                        .dim()
                    );
                }
                CompletionOutcome::PromptTooLarge {
                    prompt_tokens,
                    ceiling,
                } => {
                    println!(
                        "The assembled prompt ({prompt_tokens} tokens, ceiling {ceiling}) was too \
                         large for the completion service. Context tokens: {context_tokens}."
                    );
                }
                CompletionOutcome::Unanswered {
                    attempts,
                    last_error,
                } => {
                    println!("No answer after {attempts} attempts: {last_error}");
                }
            }

            if show_passages {
                print_passages(&passages);
            }
        }
    }
    Ok(())
}

fn print_passages(passages: &[RetrievedPassage]) {
    println!();
    println!("{}", style("Retrieved passages").bold());
    for (i, passage) in passages.iter().enumerate() {
        let snippet: String = passage
            .text
            .chars()
            .take(250)
            .collect::<String>()
            .replace('\n', " ");
        println!();
        println!("Passage {}:", i + 1);
        println!("  Id:        {}", passage.id);
        println!("  Document:  {}", passage.source_document_id);
        println!("  Distance:  {:.4} (smaller is better)", passage.distance);
        println!("  Text:      \"{snippet}...\"");
    }
}
