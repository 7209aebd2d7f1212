//! Provider traits for the external collaborators, plus the Ollama-backed
//! implementations.

pub mod document_source;
pub mod embedding;
pub mod extraction;
pub mod llm;
pub mod ollama;
pub mod vector_index;

pub use document_source::{DirectorySource, DocumentFile, DocumentSource, MemorySource};
pub use embedding::EmbeddingProvider;
pub use extraction::DocumentExtractor;
pub use llm::{ChatMessage, LlmProvider, MessageRole, TokenStream};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use vector_index::{IndexEntry, SimilarityIndex, VectorIndexProvider, VectorSearchResult};
