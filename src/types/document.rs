//! Document and chunk types produced by extraction and chunking.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::response::SourceRef;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Text,
    Markdown,
}

impl FileType {
    /// Detect the file type from an extension string.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect the file type from a file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?;
        Self::from_extension(ext)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Text => "Text",
            Self::Markdown => "Markdown",
        }
    }
}

/// One non-empty page of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// True 1-based page number in the original document
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// A parsed document: ordered non-empty pages plus provenance.
///
/// Immutable once extraction completes. `name` identifies the document within
/// a session; empty pages were dropped but surviving pages keep their true
/// page numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub file_type: FileType,
    /// Hex SHA-256 of the raw bytes
    pub content_hash: String,
    /// Raw size in bytes
    pub file_size: u64,
    pub pages: Vec<PageText>,
    /// Total page count of the original, when the format reports one
    pub total_pages: Option<u32>,
}

/// A bounded span of page text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_name: String,
    pub page_number: u32,
    /// Position within the page's split, scoped per (source, page)
    pub sequence: u32,
}

impl Chunk {
    pub fn new(
        text: impl Into<String>,
        source_name: impl Into<String>,
        page_number: u32,
        sequence: u32,
    ) -> Self {
        Self {
            text: text.into(),
            source_name: source_name.into(),
            page_number,
            sequence,
        }
    }

    /// Key for deterministic tie-breaking when similarity scores are equal.
    pub fn ord_key(&self) -> (&str, u32, u32) {
        (&self.source_name, self.page_number, self.sequence)
    }

    /// Citation for the page this chunk came from.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.source_name.clone(), self.page_number)
    }

    /// Chunk length in characters, the unit chunk sizes are measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
