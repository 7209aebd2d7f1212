//! Shared data types for documents, chunks, and turn results.

pub mod document;
pub mod response;

pub use document::{Chunk, FileType, PageText, SourceDocument};
pub use response::{DocumentFailure, DocumentSummary, ProcessReport, SourceRef, TurnReply};
