//! History-aware query rewriting.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::conversation::ConversationState;
use crate::generation::prompt::PromptBuilder;
use crate::providers::llm::{ChatMessage, LlmProvider};

/// Rewrites follow-up questions into standalone ones using the chat history.
///
/// Rewriting is best-effort: if the model call fails or returns nothing
/// usable, the raw question is used for retrieval instead.
pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Produce the retrieval query for `question`.
    ///
    /// The first turn of a conversation has no history to resolve against,
    /// so the question passes through without a model call.
    pub async fn rewrite(&self, state: &ConversationState, question: &str) -> String {
        if !state.has_history() {
            return question.to_string();
        }

        let history = PromptBuilder::format_history(state);
        let input = PromptBuilder::build_rewrite_input(&history, question);
        let messages = vec![ChatMessage::user(input)];

        match self
            .llm
            .generate(PromptBuilder::rewrite_system_prompt(), &messages)
            .await
        {
            Ok(rewritten) => {
                let rewritten = rewritten.trim();
                if rewritten.is_empty() {
                    warn!("query rewrite returned an empty string, using the raw question");
                    question.to_string()
                } else {
                    debug!("rewrote {:?} to {:?}", question, rewritten);
                    rewritten.to_string()
                }
            }
            Err(e) => {
                warn!("query rewrite failed, using the raw question: {}", e);
                question.to_string()
            }
        }
    }
}
