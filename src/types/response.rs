//! Result types returned to the caller: turn replies and processing reports.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::FileType;

/// A deduplicated citation: one source page backing an answer.
///
/// Ordered so citation sets (`BTreeSet<SourceRef>`) iterate deterministically
/// by source name, then page number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_name: String,
    pub page_number: u32,
}

impl SourceRef {
    pub fn new(source_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            source_name: source_name.into(),
            page_number,
        }
    }

    /// Display form used in chat footers, e.g. `manual.pdf (Page 3)`.
    pub fn format_inline(&self) -> String {
        format!("{} (Page {})", self.source_name, self.page_number)
    }
}

/// A completed conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub answer: String,
    /// Pages of the chunks that grounded the answer
    pub sources: BTreeSet<SourceRef>,
    /// Standalone query actually used for retrieval
    pub rewritten_query: String,
    pub chunks_retrieved: usize,
    pub processing_time_ms: u64,
}

/// Outcome of processing a document set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    pub documents: Vec<DocumentSummary>,
    pub failures: Vec<DocumentFailure>,
    pub total_chunks: usize,
    pub processing_time_ms: u64,
}

impl ProcessReport {
    /// True when every listed document was indexed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.documents.is_empty()
    }
}

/// Per-document ingestion summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub file_type: FileType,
    /// Pages that contributed text (empty pages are skipped)
    pub pages_indexed: u32,
    pub total_pages: Option<u32>,
    pub chunks: usize,
    pub file_size: u64,
    pub ingested_at: DateTime<Utc>,
}

/// A document skipped during processing, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub name: String,
    pub error: String,
}
