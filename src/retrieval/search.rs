//! Query-time retrieval against the active index.

use std::sync::Arc;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_index::{SimilarityIndex, VectorSearchResult};

/// Embeds a query and ranks chunks from the active index.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: &RetrievalConfig) -> Self {
        Self {
            embedder,
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }

    /// Top-k most similar chunks for `query`.
    ///
    /// The same provider that embedded the index embeds the query; an empty
    /// index is a precondition violation, not an empty result.
    pub async fn retrieve(
        &self,
        index: &dyn SimilarityIndex,
        query: &str,
    ) -> Result<Vec<VectorSearchResult>> {
        if index.is_empty() {
            return Err(Error::IndexNotReady);
        }

        let embedding = self.embedder.embed(query).await?;
        let mut results = index.search(&embedding, self.top_k).await?;
        if let Some(threshold) = self.min_score {
            results.retain(|result| result.similarity >= threshold);
        }
        debug!(
            "retrieved {} of {} indexed chunk(s)",
            results.len(),
            index.len()
        );
        Ok(results)
    }
}
