//! Language model provider abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message in a model conversation. The system instruction is passed
/// separately from the message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, finite, lazy sequence of generated text fragments.
///
/// Dropping the stream cancels generation; after an `Err` item the stream
/// yields nothing further.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Generation backend for query rewriting and answering.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-shot generation, used for query rewriting.
    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Streaming generation, used for answer synthesis.
    async fn generate_stream(&self, system: &str, messages: &[ChatMessage])
        -> Result<TokenStream>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier used for generation.
    fn model(&self) -> &str;
}
