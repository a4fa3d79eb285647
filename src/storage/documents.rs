//! Document Store
//!
//! Plain-text documents in a flat directory, one `.txt` file each. Files
//! produced by the collection step carry a metadata header followed by a
//! CONTENT delimiter; everything after the delimiter is the document body.
//! Files without the delimiter are taken whole.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{DocloomError, Result};

/// Header/body delimiter written by the collection step.
pub const CONTENT_MARKER: &str = "-------------------- CONTENT --------------------";

/// One loaded document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier derived from the file name
    pub id: String,
    /// File name on disk
    pub file_name: String,
    /// Body text, empty if the file holds only a header
    pub body: String,
}

/// Flat directory of `.txt` documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List document file names, sorted for deterministic batch order.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            DocloomError::Storage(format!(
                "cannot read document directory '{}': {e}",
                self.root.display()
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".txt") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load one document, extracting the body after the content marker when
    /// present.
    pub fn load(&self, file_name: &str) -> Result<Document> {
        let path = self.root.join(file_name);
        let raw = fs::read_to_string(&path).map_err(|e| {
            DocloomError::Storage(format!("cannot read document '{}': {e}", path.display()))
        })?;

        Ok(Document {
            id: document_id(file_name),
            file_name: file_name.to_string(),
            body: extract_body(&raw),
        })
    }
}

fn extract_body(raw: &str) -> String {
    match raw.find(CONTENT_MARKER) {
        Some(pos) => raw[pos + CONTENT_MARKER.len()..].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Stable identifier for a document file: the sanitized stem of its name.
pub fn document_id(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
    sanitize_name(stem)
}

/// Lowercase, collapse whitespace to underscores, strip anything that is not
/// a word character, dot, or dash, and cap the length.
pub fn sanitize_name(name: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    let disallowed = DISALLOWED.get_or_init(|| Regex::new(r"[^\w.-]").expect("static regex"));

    let name = name.to_lowercase();
    let name = whitespace.replace_all(&name, "_");
    let name = disallowed.replace_all(&name, "");
    let name: String = name.chars().take(150).collect();
    if name.is_empty() {
        "untitled_document".to_string()
    } else {
        name
    }
}

// =============================================================================
// Tests
// =============================================================================
