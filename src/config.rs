//! Configuration for the RAG pipeline.
//!
//! All sections have working defaults, so an empty TOML file (or no file at
//! all) yields a usable configuration pointed at a local Ollama server.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, filling missing fields with defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::config(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::config("chunking.chunk_size must be greater than zero"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding.batch_size must be greater than zero"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than zero"));
        }
        Ok(())
    }
}

/// Text chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters carried back into the next chunk on the same page
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Boundary the splitter packs on
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_separator() -> String {
    "\n".to_string()
}

/// Embedding model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Expected vector dimensionality of the embedding model
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Number of chunks embedded per batch during indexing
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_dimensions() -> usize {
    768
}

fn default_batch_size() -> usize {
    32
}

/// Model server (Ollama) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for embeddings
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Model used for rewriting and answering
    #[serde(default = "default_generate_model")]
    pub generate_model: String,
    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries per request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            generate_model: default_generate_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_generate_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

/// Retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Optional minimum similarity; hits below it are dropped
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// Document extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Seconds to wait for PDF text extraction before giving up
    #[serde(default = "default_pdf_timeout_secs")]
    pub pdf_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_timeout_secs: default_pdf_timeout_secs(),
        }
    }
}

fn default_pdf_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.chunking.separator, "\n");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.retrieval.top_k, 4);
        assert!(config.retrieval.min_score.is_none());
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [chunking]
            chunk_size = 500

            [retrieval]
            top_k = 2
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.llm.embed_model, "nomic-embed-text");
    }

    #[test]
    fn test_validate_rejects_overlap_at_least_chunk_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 100;
        assert!(config.validate().is_err());

        config.chunking.chunk_overlap = 150;
        assert!(config.validate().is_err());

        config.chunking.chunk_overlap = 99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = RagConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}
