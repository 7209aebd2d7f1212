//! Embedding provider abstraction.

use async_trait::async_trait;

use crate::error::Result;

/// Text embedding backend.
///
/// Indexing and retrieval must go through the same provider; similarity
/// scores are meaningless across embedding spaces.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default embeds sequentially; providers
    /// with a native batch endpoint should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Vector dimensionality this provider produces.
    fn dimensions(&self) -> usize;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
