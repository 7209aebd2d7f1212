//! Similarity search over the published index.

pub mod index;
pub mod search;

pub use index::{cosine_similarity, InMemoryIndex, InMemoryIndexProvider, IndexSlot};
pub use search::Retriever;
