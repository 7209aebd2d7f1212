//! Extraction backend abstraction.

use crate::error::Result;
use crate::types::SourceDocument;

/// Turns raw document bytes into page-level text.
///
/// Extraction is CPU-bound and synchronous; the pipeline moves calls onto a
/// blocking thread.
pub trait DocumentExtractor: Send + Sync {
    /// Extract a named document. Unreadable content is an extraction error
    /// naming the document; unknown extensions are rejected before any
    /// parsing happens.
    fn extract(&self, name: &str, data: &[u8]) -> Result<SourceDocument>;
}
