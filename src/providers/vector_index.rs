//! Vector index abstraction: build once per document set, search per query.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// A chunk paired with its embedding, ready for indexing.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A search hit: a chunk and its similarity to the query.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// An immutable, fully built similarity index over one document set.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Nearest neighbors of `query`, best first, at most `k` results.
    /// Ties are broken by `(source_name, page_number, sequence)` ascending.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the indexed vectors.
    fn dimensions(&self) -> usize;
}

/// Builds immutable indexes from embedded chunks.
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Build a complete index: either the whole index comes back or an
    /// error does. No partial index escapes.
    async fn build(&self, entries: Vec<IndexEntry>) -> Result<Arc<dyn SimilarityIndex>>;

    fn name(&self) -> &str;
}
