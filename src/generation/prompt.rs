//! Prompt assembly for query rewriting and grounded answering.

use crate::conversation::ConversationState;
use crate::providers::vector_index::VectorSearchResult;

const REWRITE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, just \
reformulate it if needed and otherwise return it as is.";

const ANSWER_SYSTEM_PREAMBLE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. If you don't \
know the answer, just say that you don't know. Be concise and helpful.";

/// Builds the prompts the pipeline sends to the language model.
pub struct PromptBuilder;

impl PromptBuilder {
    /// System prompt for turning a follow-up into a standalone question.
    pub fn rewrite_system_prompt() -> &'static str {
        REWRITE_SYSTEM_PROMPT
    }

    /// User-side input for the rewrite call: the transcript so far plus the
    /// new question.
    pub fn build_rewrite_input(history: &str, question: &str) -> String {
        format!("{history}\n\nFollow Up Input: {question}")
    }

    /// Renders prior Human/Assistant exchanges as a plain transcript.
    /// System turns (the greeting) are left out by `exchanges`.
    pub fn format_history(state: &ConversationState) -> String {
        let mut transcript = String::new();
        for turn in state.exchanges() {
            transcript.push_str(turn.role_label());
            transcript.push_str(": ");
            transcript.push_str(turn.text());
            transcript.push('\n');
        }
        transcript.trim_end().to_string()
    }

    /// System prompt for the answering call, with the retrieved context
    /// spliced in.
    pub fn answer_system_prompt(context: &str) -> String {
        format!("{ANSWER_SYSTEM_PREAMBLE}\n\n{context}")
    }

    /// Concatenates retrieved chunk texts into the context block.
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|result| result.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use std::collections::BTreeSet;

    fn result(text: &str, score: f32) -> VectorSearchResult {
        VectorSearchResult {
            chunk: Chunk::new(text, "doc.txt", 1, 0),
            similarity: score,
        }
    }

    #[test]
    fn test_rewrite_prompt_forbids_answering() {
        let prompt = PromptBuilder::rewrite_system_prompt();
        assert!(prompt.contains("Do NOT answer the question"));
        assert!(prompt.contains("standalone question"));
    }

    #[test]
    fn test_answer_prompt_embeds_context_and_honesty_clause() {
        let prompt = PromptBuilder::answer_system_prompt("the sky is blue");
        assert!(prompt.contains("don't know"));
        assert!(prompt.ends_with("the sky is blue"));
    }

    #[test]
    fn test_build_context_joins_chunks_with_blank_lines() {
        let results = vec![result("first chunk", 0.9), result("second chunk", 0.8)];
        assert_eq!(
            PromptBuilder::build_context(&results),
            "first chunk\n\nsecond chunk"
        );
    }

    #[test]
    fn test_format_history_labels_turns_and_skips_greeting() {
        let mut state = ConversationState::default();
        state.append_human("What is RAG?");
        state.append_ai("Retrieval-augmented generation.", BTreeSet::new());

        let history = PromptBuilder::format_history(&state);
        assert_eq!(
            history,
            "Human: What is RAG?\nAssistant: Retrieval-augmented generation."
        );
        assert!(!history.contains("Hello"));
    }

    #[test]
    fn test_rewrite_input_appends_follow_up_marker() {
        let input = PromptBuilder::build_rewrite_input("Human: hi\nAssistant: hello", "and then?");
        assert!(input.ends_with("Follow Up Input: and then?"));
        assert!(input.starts_with("Human: hi"));
    }
}
