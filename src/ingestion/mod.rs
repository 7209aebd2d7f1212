//! Document ingestion: extraction, chunking, and index construction.

pub mod chunker;
pub mod extractor;
pub mod indexer;

pub use chunker::TextChunker;
pub use extractor::TextExtractor;
pub use indexer::EmbeddingIndexer;
