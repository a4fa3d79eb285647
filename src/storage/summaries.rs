//! Summary Store
//!
//! Pre-generated condensed summaries, one plain-text file per source
//! document (`<document id>_summary.txt`). A missing summary is not an
//! error; lookups simply return nothing and the caller assembles context
//! without it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ai::context::SummaryLookup;
use crate::types::{DocloomError, Result};

/// File name suffix appended to the source document id.
pub const SUMMARY_SUFFIX: &str = "_summary.txt";

/// Flat directory of per-document summary files.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    root: PathBuf,
}

impl SummaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, source_id: &str) -> PathBuf {
        self.root.join(format!("{source_id}{SUMMARY_SUFFIX}"))
    }

    /// Whether a non-empty summary file exists for `source_id`.
    pub fn exists(&self, source_id: &str) -> bool {
        self.get(source_id).is_some()
    }

    /// Read the summary for `source_id`, if one exists.
    pub fn get(&self, source_id: &str) -> Option<String> {
        let path = self.path_for(source_id);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                debug!("could not read summary '{}': {e}", path.display());
                None
            }
        }
    }

    /// Write the summary for `source_id`, creating the directory if needed.
    pub fn put(&self, source_id: &str, summary: &str) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            DocloomError::Storage(format!(
                "cannot create summary directory '{}': {e}",
                self.root.display()
            ))
        })?;
        let path = self.path_for(source_id);
        fs::write(&path, summary).map_err(|e| {
            DocloomError::Storage(format!("cannot write summary '{}': {e}", path.display()))
        })
    }
}

impl SummaryLookup for SummaryStore {
    fn summary_for(&self, source_document_id: &str) -> Option<String> {
        self.get(source_document_id)
    }
}

// =============================================================================
// Tests
// =============================================================================
