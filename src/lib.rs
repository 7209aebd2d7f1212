//! chat-rag: Conversational RAG over local documents with cited answers
//!
//! This crate turns a set of PDF, text, and Markdown documents into a
//! chat-style question answering session backed by a local Ollama server.
//! Documents are extracted page by page, chunked, embedded, and held in an
//! in-memory vector index. Each turn rewrites the question against the chat
//! history, retrieves the closest chunks by cosine similarity, and streams a
//! grounded answer with (source, page) citations.
//!
//! [`ChatSession`] is the entry point; see `src/bin/chat.rs` for the
//! terminal front end.

pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::RagConfig;
pub use conversation::{ConversationState, ConversationTurn};
pub use error::{Error, Result};
pub use pipeline::ChatSession;
pub use types::{Chunk, ProcessReport, SourceRef, TurnReply};
