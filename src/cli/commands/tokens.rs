//! Tokens Command
//!
//! Per-document token counts, printed as a table and optionally written to
//! a CSV file for spreadsheet analysis.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::ai::Tokenizer;
use crate::config::Config;
use crate::storage::DocumentStore;
use crate::types::Result;

pub fn run(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let tokenizer = Tokenizer::new();
    let documents = DocumentStore::new(&config.paths.documents_dir);

    let mut rows: Vec<(String, usize)> = Vec::new();
    for name in documents.list()? {
        let document = match documents.load(&name) {
            Ok(document) => document,
            Err(e) => {
                warn!("skipping '{name}': {e}");
                continue;
            }
        };
        if document.body.is_empty() {
            continue;
        }
        rows.push((document.id, tokenizer.count(&document.body)));
    }

    if tokenizer.is_approximate() {
        eprintln!("note: counts are approximate (word-based fallback)");
    }

    println!("{:<50} {:>10}", "document", "tokens");
    for (id, count) in &rows {
        println!("{id:<50} {count:>10}");
    }
    let total: usize = rows.iter().map(|(_, count)| count).sum();
    println!("{:<50} {:>10}", "total", total);

    if let Some(path) = output {
        let mut csv = String::from("document,tokens\n");
        for (id, count) in &rows {
            csv.push_str(&format!("{id},{count}\n"));
        }
        fs::write(&path, csv)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
