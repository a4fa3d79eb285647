//! Storage Layer
//!
//! Plain-text persistence: a flat directory of source documents and a flat
//! directory of per-document condensed summaries.

pub mod documents;
pub mod summaries;

pub use documents::{CONTENT_MARKER, Document, DocumentStore, document_id, sanitize_name};
pub use summaries::{SUMMARY_SUFFIX, SummaryStore};
