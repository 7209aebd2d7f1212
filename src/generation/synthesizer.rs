//! Streamed answer synthesis over retrieved context.

use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::generation::prompt::PromptBuilder;
use crate::providers::llm::{ChatMessage, LlmProvider, TokenStream};
use crate::providers::vector_index::VectorSearchResult;
use crate::types::SourceRef;

/// A streaming answer plus the citations backing it.
///
/// Fragments arrive in generation order. The citation set is known up front
/// because it derives from the retrieved chunks, not from the model output.
pub struct AnswerStream {
    fragments: TokenStream,
    sources: BTreeSet<SourceRef>,
}

impl AnswerStream {
    /// Next answer fragment, or `None` when generation is complete.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        self.fragments.next().await
    }

    pub fn sources(&self) -> &BTreeSet<SourceRef> {
        &self.sources
    }

    pub fn into_sources(self) -> BTreeSet<SourceRef> {
        self.sources
    }

    /// Drain the stream into a single string. Fails on the first fragment
    /// error.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut answer = String::new();
        while let Some(fragment) = self.fragments.next().await {
            answer.push_str(&fragment?);
        }
        Ok(answer)
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().fragments.as_mut().poll_next(cx)
    }
}

/// Generates grounded answers from retrieved chunks.
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Start generating an answer to `question` grounded in `context`.
    ///
    /// The returned stream carries one deduplicated `SourceRef` per distinct
    /// (source, page) pair among the retrieved chunks.
    pub async fn synthesize(
        &self,
        question: &str,
        context: &[VectorSearchResult],
    ) -> Result<AnswerStream> {
        if context.is_empty() {
            return Err(Error::generation("no context chunks to answer from"));
        }

        let context_block = PromptBuilder::build_context(context);
        let system = PromptBuilder::answer_system_prompt(&context_block);
        let messages = vec![ChatMessage::user(question.to_string())];

        let sources: BTreeSet<SourceRef> = context
            .iter()
            .map(|result| result.chunk.source_ref())
            .collect();
        debug!(
            "synthesizing from {} chunk(s), {} distinct source(s)",
            context.len(),
            sources.len()
        );

        let fragments = self.llm.generate_stream(&system, &messages).await?;
        Ok(AnswerStream { fragments, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StreamingLlm {
        fragments: Vec<std::result::Result<&'static str, &'static str>>,
        last_system: Mutex<Option<String>>,
    }

    impl StreamingLlm {
        fn new(fragments: Vec<std::result::Result<&'static str, &'static str>>) -> Self {
            Self {
                fragments,
                last_system: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StreamingLlm {
        async fn generate(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
            Err(Error::generation("streaming only"))
        }

        async fn generate_stream(
            &self,
            system: &str,
            _messages: &[ChatMessage],
        ) -> Result<TokenStream> {
            *self.last_system.lock().unwrap() = Some(system.to_string());
            let items: Vec<Result<String>> = self
                .fragments
                .iter()
                .map(|fragment| match fragment {
                    Ok(text) => Ok(text.to_string()),
                    Err(message) => Err(Error::generation(*message)),
                })
                .collect();
            Ok(futures_util::stream::iter(items).boxed())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "streaming"
        }

        fn model(&self) -> &str {
            "streaming"
        }
    }

    fn hit(text: &str, source: &str, page: u32) -> VectorSearchResult {
        VectorSearchResult {
            chunk: Chunk::new(text, source, page, 0),
            similarity: 0.9,
        }
    }

    #[tokio::test]
    async fn test_fragments_stream_in_order() {
        let llm = Arc::new(StreamingLlm::new(vec![Ok("The "), Ok("answer"), Ok(".")]));
        let synthesizer = AnswerSynthesizer::new(llm as Arc<dyn LlmProvider>);

        let mut stream = synthesizer
            .synthesize("question?", &[hit("context", "doc.txt", 1)])
            .await
            .unwrap();

        // First fragment through the `Stream` impl, the rest drained.
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "The ");
        assert_eq!(stream.collect_text().await.unwrap(), "answer.");
    }

    #[tokio::test]
    async fn test_sources_deduplicate_by_source_and_page() {
        let llm = Arc::new(StreamingLlm::new(vec![Ok("ok")]));
        let synthesizer = AnswerSynthesizer::new(llm as Arc<dyn LlmProvider>);

        let context = vec![
            hit("a", "manual.pdf", 3),
            hit("b", "manual.pdf", 3),
            hit("c", "manual.pdf", 1),
            hit("d", "notes.txt", 1),
        ];
        let stream = synthesizer.synthesize("q", &context).await.unwrap();

        let refs: Vec<String> = stream
            .sources()
            .iter()
            .map(SourceRef::format_inline)
            .collect();
        assert_eq!(
            refs,
            vec!["manual.pdf (Page 1)", "manual.pdf (Page 3)", "notes.txt (Page 1)"]
        );
    }

    #[tokio::test]
    async fn test_mid_stream_error_surfaces() {
        let llm = Arc::new(StreamingLlm::new(vec![
            Ok("partial "),
            Err("connection dropped"),
        ]));
        let synthesizer = AnswerSynthesizer::new(llm as Arc<dyn LlmProvider>);

        let mut stream = synthesizer
            .synthesize("q", &[hit("context", "doc.txt", 1)])
            .await
            .unwrap();

        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "partial ");
        let err = stream.next_fragment().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection dropped"));
    }

    #[tokio::test]
    async fn test_system_prompt_carries_retrieved_context() {
        let llm = Arc::new(StreamingLlm::new(vec![Ok("ok")]));
        let synthesizer = AnswerSynthesizer::new(Arc::clone(&llm) as Arc<dyn LlmProvider>);

        synthesizer
            .synthesize("q", &[hit("warranty lasts two years", "manual.pdf", 7)])
            .await
            .unwrap();

        let system = llm.last_system.lock().unwrap().clone().unwrap();
        assert!(system.contains("warranty lasts two years"));
        assert!(system.contains("don't know"));
    }

    #[tokio::test]
    async fn test_empty_context_is_rejected() {
        let llm = Arc::new(StreamingLlm::new(vec![Ok("ok")]));
        let synthesizer = AnswerSynthesizer::new(llm as Arc<dyn LlmProvider>);

        let Err(err) = synthesizer.synthesize("q", &[]).await else {
            panic!("synthesis accepted an empty context");
        };
        assert!(matches!(err, Error::Generation(_)));
    }
}
