//! Conversation history: an append-only log of tagged turns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::SourceRef;

/// Greeting carried by the initial `System` turn.
pub const DEFAULT_GREETING: &str = "Hello! Upload your documents to get started.";

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationTurn {
    System {
        text: String,
    },
    Human {
        text: String,
    },
    Ai {
        text: String,
        /// Deduplicated pages the answer was grounded on
        sources: BTreeSet<SourceRef>,
    },
}

impl ConversationTurn {
    pub fn text(&self) -> &str {
        match self {
            Self::System { text } | Self::Human { text } | Self::Ai { text, .. } => text,
        }
    }

    pub fn role_label(&self) -> &'static str {
        match self {
            Self::System { .. } => "System",
            Self::Human { .. } => "Human",
            Self::Ai { .. } => "Assistant",
        }
    }
}

/// Ordered turn history for one session.
///
/// Append-only while the session runs; `reset` returns it to a single `System`
/// greeting turn. The orchestration layer appends strictly after a turn
/// completes, so a failed turn leaves no trace here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
    greeting: String,
}

impl ConversationState {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            turns: vec![ConversationTurn::System {
                text: greeting.clone(),
            }],
            greeting,
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True once any human/assistant exchange exists.
    pub fn has_history(&self) -> bool {
        self.turns
            .iter()
            .any(|turn| !matches!(turn, ConversationTurn::System { .. }))
    }

    /// Human and assistant turns in order, skipping system turns.
    pub fn exchanges(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns
            .iter()
            .filter(|turn| !matches!(turn, ConversationTurn::System { .. }))
    }

    pub fn append_human(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::Human { text: text.into() });
    }

    pub fn append_ai(&mut self, text: impl Into<String>, sources: BTreeSet<SourceRef>) {
        self.turns.push(ConversationTurn::Ai {
            text: text.into(),
            sources,
        });
    }

    /// Clear back to a single system greeting turn.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.turns.push(ConversationTurn::System {
            text: self.greeting.clone(),
        });
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}
