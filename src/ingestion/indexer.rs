//! All-or-nothing embedding and index construction.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_index::{IndexEntry, SimilarityIndex, VectorIndexProvider};
use crate::types::Chunk;

/// Embeds chunk batches and builds a fresh index.
///
/// Any embedding failure, count mismatch, or wrong-dimension vector aborts
/// the whole build; nothing is returned and whatever index the caller had
/// published stays untouched.
pub struct EmbeddingIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index_provider: Arc<dyn VectorIndexProvider>,
    batch_size: usize,
}

impl EmbeddingIndexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index_provider: Arc<dyn VectorIndexProvider>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            embedder,
            index_provider,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Embed every chunk and build the index.
    pub async fn build_index(&self, chunks: Vec<Chunk>) -> Result<Arc<dyn SimilarityIndex>> {
        if chunks.is_empty() {
            return Err(Error::indexing("no chunks to index"));
        }

        let expected_dims = self.embedder.dimensions();
        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut entries = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await.map_err(|e| {
                Error::indexing(format!("embedding batch {} failed: {e}", batch_index + 1))
            })?;

            if vectors.len() != batch.len() {
                return Err(Error::indexing(format!(
                    "embedding batch {} returned {} vectors for {} chunks",
                    batch_index + 1,
                    vectors.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != expected_dims {
                    return Err(Error::indexing(format!(
                        "chunk {}:{}:{} embedded to {} dimensions, expected {}",
                        chunk.source_name,
                        chunk.page_number,
                        chunk.sequence,
                        embedding.len(),
                        expected_dims
                    )));
                }
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    embedding,
                });
            }
            debug!("embedded batch {}/{}", batch_index + 1, total_batches);
        }

        let index = self.index_provider.build(entries).await?;
        info!(
            "indexed {} chunk(s) across {} batch(es)",
            chunks.len(),
            total_batches
        );
        Ok(index)
    }
}
