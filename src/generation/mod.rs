//! Query rewriting and answer generation.

pub mod prompt;
pub mod rewriter;
pub mod synthesizer;

pub use prompt::PromptBuilder;
pub use rewriter::QueryRewriter;
pub use synthesizer::{AnswerStream, AnswerSynthesizer};
