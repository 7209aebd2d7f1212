//! In-memory cosine similarity index and the session's publish slot.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::providers::vector_index::{
    IndexEntry, SimilarityIndex, VectorIndexProvider, VectorSearchResult,
};

/// Cosine similarity of two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Fully built, immutable index over one document set.
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl InMemoryIndex {
    /// Build from embedded chunks. Empty input or inconsistent vector
    /// dimensions are indexing errors.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = match entries.first() {
            Some(entry) => entry.embedding.len(),
            None => return Err(Error::indexing("cannot build an index over zero chunks")),
        };
        if dimensions == 0 {
            return Err(Error::indexing("embedding vectors have zero dimensions"));
        }
        for entry in &entries {
            if entry.embedding.len() != dimensions {
                return Err(Error::indexing(format!(
                    "inconsistent embedding dimensions: expected {}, chunk {}:{}:{} has {}",
                    dimensions,
                    entry.chunk.source_name,
                    entry.chunk.page_number,
                    entry.chunk.sequence,
                    entry.embedding.len()
                )));
            }
        }
        Ok(Self {
            entries,
            dimensions,
        })
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorSearchResult>> {
        if query.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }
        let mut results: Vec<VectorSearchResult> = self
            .entries
            .iter()
            .map(|entry| VectorSearchResult {
                chunk: entry.chunk.clone(),
                similarity: cosine_similarity(query, &entry.embedding),
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.ord_key().cmp(&b.chunk.ord_key()))
        });
        results.truncate(k);
        Ok(results)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Builds `InMemoryIndex` instances.
#[derive(Debug, Default)]
pub struct InMemoryIndexProvider;

#[async_trait]
impl VectorIndexProvider for InMemoryIndexProvider {
    async fn build(&self, entries: Vec<IndexEntry>) -> Result<Arc<dyn SimilarityIndex>> {
        let index = InMemoryIndex::build(entries)?;
        debug!("built in-memory index over {} chunks", index.len());
        Ok(Arc::new(index))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Holder for a session's active index.
///
/// `publish` swaps the whole index at once, so readers see either the old
/// fully built index or the new one, never an intermediate state.
#[derive(Default)]
pub struct IndexSlot {
    current: RwLock<Option<Arc<dyn SimilarityIndex>>>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// The active index, if one has been published.
    pub fn current(&self) -> Option<Arc<dyn SimilarityIndex>> {
        self.current.read().clone()
    }

    /// Replace the active index with a fully built one.
    pub fn publish(&self, index: Arc<dyn SimilarityIndex>) {
        *self.current.write() = Some(index);
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}
