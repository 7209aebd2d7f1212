//! The conversational pipeline: ingestion on one side, chat turns on the
//! other.
//!
//! A [`ChatSession`] owns the conversation history and the active index.
//! Processing a document set replaces the index atomically; a failed rebuild
//! leaves the previous index serving. A chat turn only becomes part of the
//! history once the full answer has been generated, so a failed turn leaves
//! the conversation exactly as it was.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::conversation::ConversationState;
use crate::error::{Error, Result};
use crate::generation::{AnswerSynthesizer, QueryRewriter};
use crate::ingestion::{EmbeddingIndexer, TextChunker, TextExtractor};
use crate::providers::document_source::DocumentSource;
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::extraction::DocumentExtractor;
use crate::providers::llm::LlmProvider;
use crate::providers::ollama::OllamaProvider;
use crate::providers::vector_index::VectorIndexProvider;
use crate::retrieval::{IndexSlot, InMemoryIndexProvider, Retriever};
use crate::types::{Chunk, DocumentFailure, DocumentSummary, ProcessReport, TurnReply};

/// One user's documents and conversation.
pub struct ChatSession {
    id: Uuid,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    extractor: Arc<dyn DocumentExtractor>,
    chunker: TextChunker,
    indexer: EmbeddingIndexer,
    retriever: Retriever,
    rewriter: QueryRewriter,
    synthesizer: AnswerSynthesizer,
    index: IndexSlot,
    state: ConversationState,
}

impl ChatSession {
    /// Build a session from explicit providers.
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index_provider: Arc<dyn VectorIndexProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let session = Self {
            id,
            extractor: Arc::new(TextExtractor::new(&config.extraction)),
            chunker: TextChunker::new(&config.chunking),
            indexer: EmbeddingIndexer::new(
                Arc::clone(&embedder),
                index_provider,
                &config.embedding,
            ),
            retriever: Retriever::new(Arc::clone(&embedder), &config.retrieval),
            rewriter: QueryRewriter::new(Arc::clone(&llm)),
            synthesizer: AnswerSynthesizer::new(Arc::clone(&llm)),
            embedder,
            llm,
            index: IndexSlot::new(),
            state: ConversationState::default(),
        };
        info!("created chat session {}", id);
        Ok(session)
    }

    /// Build a session backed by a local Ollama server and the in-memory
    /// index.
    pub fn with_ollama(config: RagConfig) -> Result<Self> {
        let provider = OllamaProvider::new(config.llm.clone(), &config.embedding)?;
        let (embedder, llm) = provider.split();
        Self::new(config, embedder, llm, Arc::new(InMemoryIndexProvider))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Whether an index is available to answer against.
    pub fn is_ready(&self) -> bool {
        self.index.is_ready()
    }

    /// Clear the conversation history. The index stays: the same documents
    /// can be questioned from a clean slate.
    pub fn reset(&mut self) {
        self.state.reset();
        info!("conversation reset for session {}", self.id);
    }

    /// Check that both model endpoints are reachable.
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.embedder.health_check().await? && self.llm.health_check().await?)
    }

    /// Extract, chunk, embed, and index every document from `source`.
    ///
    /// Documents that fail extraction are reported and skipped; the rest are
    /// indexed. The new index replaces the old one only after the whole
    /// build succeeds.
    pub async fn process_documents(&self, source: &dyn DocumentSource) -> Result<ProcessReport> {
        let started = Instant::now();
        let files = source.list_documents().await?;
        info!("processing {} document(s) from {}", files.len(), source.name());

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        let mut all_chunks = Vec::new();

        for file in files {
            let extractor = Arc::clone(&self.extractor);
            let name = file.name.clone();
            let task_name = file.name;
            let data = file.data;
            let extracted =
                tokio::task::spawn_blocking(move || extractor.extract(&task_name, &data))
                    .await
                    .map_err(|e| Error::internal(format!("extraction task failed: {e}")))
                    .and_then(|result| result);

            match extracted {
                Ok(document) => {
                    let chunks = self.chunker.chunk_document(&document);
                    debug!(
                        "chunked {} into {} chunk(s), {} chars",
                        document.name,
                        chunks.len(),
                        chunks.iter().map(Chunk::char_len).sum::<usize>()
                    );
                    documents.push(DocumentSummary {
                        name: document.name.clone(),
                        file_type: document.file_type,
                        pages_indexed: document.pages.len() as u32,
                        total_pages: document.total_pages,
                        chunks: chunks.len(),
                        file_size: document.file_size,
                        ingested_at: Utc::now(),
                    });
                    all_chunks.extend(chunks);
                }
                Err(e) => {
                    warn!("failed to extract {}: {}", name, e);
                    failures.push(DocumentFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        if all_chunks.is_empty() {
            return Err(Error::indexing(
                "no chunks could be produced from the document set",
            ));
        }

        let total_chunks = all_chunks.len();
        let index = self.indexer.build_index(all_chunks).await?;
        self.index.publish(index);

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "processed {} document(s) with {} failure(s), {} chunk(s) in {} ms",
            documents.len(),
            failures.len(),
            total_chunks,
            processing_time_ms
        );
        Ok(ProcessReport {
            documents,
            failures,
            total_chunks,
            processing_time_ms,
        })
    }

    /// Answer one question, updating the history on success.
    pub async fn handle_turn(&mut self, question: &str) -> Result<TurnReply> {
        self.handle_turn_streaming(question, |_| {}).await
    }

    /// Answer one question, invoking `on_fragment` for each piece of the
    /// answer as it is generated.
    ///
    /// The history is only updated once the complete answer is in hand. Any
    /// failure, including mid-stream, discards the turn entirely.
    pub async fn handle_turn_streaming<F>(
        &mut self,
        question: &str,
        mut on_fragment: F,
    ) -> Result<TurnReply>
    where
        F: FnMut(&str),
    {
        let started = Instant::now();
        let index = self.index.current().ok_or(Error::IndexNotReady)?;

        let rewritten = self.rewriter.rewrite(&self.state, question).await;
        let hits = self.retriever.retrieve(index.as_ref(), &rewritten).await?;
        let mut stream = self.synthesizer.synthesize(question, &hits).await?;

        let mut answer = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            answer.push_str(&fragment);
        }
        if answer.trim().is_empty() {
            return Err(Error::generation("model produced an empty answer"));
        }
        let sources = stream.into_sources();

        self.state.append_human(question);
        self.state.append_ai(answer.clone(), sources.clone());

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "answered from {} chunk(s) in {} ms",
            hits.len(),
            processing_time_ms
        );
        Ok(TurnReply {
            answer,
            sources,
            rewritten_query: rewritten,
            chunks_retrieved: hits.len(),
            processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::document_source::{DocumentFile, MemorySource};
    use crate::providers::llm::{ChatMessage, TokenStream};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    struct StubEmbedder {
        fail: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::embedding("embedder offline"));
            }
            let mut vector = vec![0.0_f32; 4];
            for (index, byte) in text.bytes().enumerate() {
                vector[index % 4] += byte as f32;
            }
            Ok(vector)
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub-embedder"
        }
    }

    /// `None` in `fragments` turns into a mid-stream error.
    struct StubLlm {
        generate_calls: AtomicUsize,
        stream_calls: AtomicUsize,
        fragments: Vec<Option<&'static str>>,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn generate(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok("standalone question".to_string())
        }

        async fn generate_stream(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
        ) -> Result<TokenStream> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<String>> = self
                .fragments
                .iter()
                .map(|fragment| match fragment {
                    Some(text) => Ok(text.to_string()),
                    None => Err(Error::generation("stream interrupted")),
                })
                .collect();
            Ok(futures_util::stream::iter(items).boxed())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub-llm"
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    fn session_with(
        fragments: Vec<Option<&'static str>>,
    ) -> (ChatSession, Arc<StubEmbedder>, Arc<StubLlm>) {
        let embedder = Arc::new(StubEmbedder {
            fail: AtomicBool::new(false),
        });
        let llm = Arc::new(StubLlm {
            generate_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            fragments,
        });
        let mut config = RagConfig::default();
        config.embedding.dimensions = 4;
        let session = ChatSession::new(
            config,
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
            Arc::clone(&llm) as Arc<dyn LlmProvider>,
            Arc::new(InMemoryIndexProvider),
        )
        .unwrap();
        (session, embedder, llm)
    }

    fn doc_source() -> MemorySource {
        MemorySource::new(vec![DocumentFile::new(
            "doc.txt",
            b"The warranty lasts two years.\nContact support by email.".to_vec(),
        )])
    }

    #[tokio::test]
    async fn test_turn_fails_before_documents_are_processed() {
        let (mut session, _, _) = session_with(vec![Some("unused")]);

        let err = session.handle_turn("anything there?").await.unwrap_err();
        assert!(matches!(err, Error::IndexNotReady));
        assert_eq!(session.state().len(), 1);
    }

    #[tokio::test]
    async fn test_happy_path_appends_turns_and_cites_sources() {
        let (mut session, _, llm) = session_with(vec![Some("Two "), Some("years.")]);
        let report = assert_ok!(session.process_documents(&doc_source()).await);
        assert!(report.is_clean());

        let reply = assert_ok!(session.handle_turn("How long is the warranty?").await);

        assert_eq!(reply.answer, "Two years.");
        assert_eq!(reply.rewritten_query, "How long is the warranty?");
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);
        assert!(reply.chunks_retrieved >= 1);
        let cited: Vec<String> = reply.sources.iter().map(|s| s.format_inline()).collect();
        assert_eq!(cited, vec!["doc.txt (Page 1)"]);

        // Greeting, the question, and the answer.
        assert_eq!(session.state().len(), 3);
        assert_eq!(session.state().exchanges().count(), 2);
    }

    #[tokio::test]
    async fn test_follow_up_is_rewritten_after_the_first_exchange() {
        let (mut session, _, llm) = session_with(vec![Some("An answer.")]);
        session.process_documents(&doc_source()).await.unwrap();

        session.handle_turn("How long is the warranty?").await.unwrap();
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);

        let reply = session.handle_turn("and after that?").await.unwrap();
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(reply.rewritten_query, "standalone question");
    }

    #[tokio::test]
    async fn test_stream_failure_discards_the_whole_turn() {
        let (mut session, _, _) = session_with(vec![Some("par"), Some("tial "), None]);
        session.process_documents(&doc_source()).await.unwrap();

        let err = session.handle_turn("question?").await.unwrap_err();
        assert!(err.to_string().contains("stream interrupted"));
        // Neither the question nor the partial answer made it into history.
        assert_eq!(session.state().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_discards_the_turn() {
        let (mut session, _, _) = session_with(vec![Some("   \n")]);
        session.process_documents(&doc_source()).await.unwrap();

        let err = session.handle_turn("question?").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(session.state().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reindex_preserves_the_previous_index() {
        let (mut session, embedder, _) = session_with(vec![Some("Still answering.")]);
        session.process_documents(&doc_source()).await.unwrap();

        embedder.fail.store(true, Ordering::SeqCst);
        let err = session.process_documents(&doc_source()).await.unwrap_err();
        assert!(matches!(err, Error::Indexing(_)));
        assert!(session.is_ready());

        embedder.fail.store(false, Ordering::SeqCst);
        let reply = session.handle_turn("still there?").await.unwrap();
        assert_eq!(reply.answer, "Still answering.");
    }

    #[tokio::test]
    async fn test_empty_source_is_an_indexing_error() {
        let (session, _, _) = session_with(vec![Some("unused")]);

        let err = session
            .process_documents(&MemorySource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Indexing(_)));
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_partial_extraction_failure_is_reported() {
        let (session, _, _) = session_with(vec![Some("unused")]);
        let source = MemorySource::new(vec![
            DocumentFile::new("good.txt", b"usable text".to_vec()),
            DocumentFile::new("bad.docx", b"unsupported".to_vec()),
        ]);

        let report = session.process_documents(&source).await.unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "bad.docx");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_reset_clears_history_but_keeps_the_index() {
        let (mut session, _, _) = session_with(vec![Some("An answer.")]);
        session.process_documents(&doc_source()).await.unwrap();
        session.handle_turn("first question?").await.unwrap();
        assert_eq!(session.state().len(), 3);

        session.reset();
        assert_eq!(session.state().len(), 1);
        assert!(session.is_ready());

        let reply = session.handle_turn("fresh question?").await.unwrap();
        assert_eq!(reply.answer, "An answer.");
    }

    #[tokio::test]
    async fn test_streaming_callback_sees_every_fragment() {
        let (mut session, _, _) = session_with(vec![Some("a"), Some("b"), Some("c")]);
        session.process_documents(&doc_source()).await.unwrap();

        let mut seen = Vec::new();
        let reply = session
            .handle_turn_streaming("question?", |fragment| seen.push(fragment.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(reply.answer, "abc");
    }
}
