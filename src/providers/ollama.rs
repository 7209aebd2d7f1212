//! Ollama-backed providers: embeddings and generation over one shared client.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LlmProvider, MessageRole, TokenStream};

/// HTTP client for the Ollama REST API.
pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn embed_model(&self) -> &str {
        &self.config.embed_model
    }

    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    /// Retry a request with exponential backoff between attempts.
    async fn retry_request<F, Fut, T>(&self, operation: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 1));
                warn!(
                    "{} failed, retrying in {:?} (attempt {}/{})",
                    operation, backoff, attempt, self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
            }
            match request().await {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::internal(format!("{operation} failed without an error"))))
    }

    /// Request an embedding for one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        self.retry_request("embedding request", || async {
            let response = self
                .client
                .post(&url)
                .json(&EmbedRequest {
                    model: &self.config.embed_model,
                    prompt: text,
                })
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "server returned {}",
                    response.status()
                )));
            }
            let body: EmbedResponse = response.json().await?;
            if body.embedding.is_empty() {
                return Err(Error::embedding("server returned an empty embedding"));
            }
            Ok(body.embedding)
        })
        .await
    }

    /// Single-shot generation.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        self.retry_request("generation request", || async {
            let response = self
                .client
                .post(&url)
                .json(&GenerateRequest {
                    model: &self.config.generate_model,
                    prompt,
                    system,
                    stream: false,
                    options: GenerateOptions {
                        temperature: self.config.temperature,
                    },
                })
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Error::generation(format!(
                    "server returned {}",
                    response.status()
                )));
            }
            let body: GenerateResponse = response.json().await?;
            Ok(body.response)
        })
        .await
    }

    /// Streaming generation. Fragments arrive as the server produces them;
    /// dropping the stream cancels the request. Only the initial request is
    /// retried, never a broken stream.
    pub async fn generate_stream(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        let url = format!("{}/api/generate", self.config.base_url);
        let response = self
            .retry_request("generation request", || async {
                let response = self
                    .client
                    .post(&url)
                    .json(&GenerateRequest {
                        model: &self.config.generate_model,
                        prompt,
                        system,
                        stream: true,
                        options: GenerateOptions {
                            temperature: self.config.temperature,
                        },
                    })
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(Error::generation(format!(
                        "server returned {}",
                        response.status()
                    )));
                }
                Ok(response)
            })
            .await?;

        Ok(decode_ndjson_stream(Box::pin(response.bytes_stream())))
    }

    /// Check the server is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// One NDJSON line of a streaming generate response.
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

struct StreamState<S> {
    inner: S,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> StreamState<S> {
    /// Parse one NDJSON line, queueing its fragment.
    fn take_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let chunk: StreamChunk = serde_json::from_str(line)
            .map_err(|e| Error::generation(format!("malformed stream line: {e}")))?;
        if let Some(message) = chunk.error {
            return Err(Error::generation(message));
        }
        if !chunk.response.is_empty() {
            self.pending.push_back(chunk.response);
        }
        if chunk.done {
            self.finished = true;
        }
        Ok(())
    }
}

/// Decode an NDJSON byte stream into a fragment stream.
///
/// Reads can split a line, or a multi-byte character, at any byte boundary.
/// Bytes accumulate until a newline shows up and only complete lines are
/// decoded as UTF-8. After an error item the stream ends.
fn decode_ndjson_stream<S, B, E>(source: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = StreamState {
        inner: source,
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    state.buf.extend_from_slice(bytes.as_ref());
                    while let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = state.buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        if let Err(e) = state.take_line(line.trim()) {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        if state.finished {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((
                        Err(Error::generation(format!("stream transport failed: {e}"))),
                        state,
                    ));
                }
                None => {
                    state.finished = true;
                    let tail = std::mem::take(&mut state.buf);
                    let tail = String::from_utf8_lossy(&tail);
                    if let Err(e) = state.take_line(tail.trim()) {
                        return Some((Err(e), state));
                    }
                }
            }
        }
    }))
}

/// Embedding provider backed by `/api/embeddings`.
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(llm: LlmConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(llm)?),
            dimensions: embedding.dimensions,
        })
    }

    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    // The embeddings endpoint takes one prompt per request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.client.embed(text).await?);
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Generation provider backed by `/api/generate`.
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
}

impl OllamaLlm {
    pub fn new(llm: LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(llm)?),
        })
    }

    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

/// Flatten chat messages into a single prompt for the completion API.
///
/// A lone user message passes through untouched; anything longer becomes a
/// role-labelled transcript.
fn flatten_messages(messages: &[ChatMessage]) -> String {
    if let [only] = messages {
        if only.role == MessageRole::User {
            return only.content.clone();
        }
    }
    let mut prompt = String::new();
    for message in messages {
        let label = match message.role {
            MessageRole::User => "Human",
            MessageRole::Assistant => "Assistant",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let prompt = flatten_messages(messages);
        self.client.generate(system, &prompt).await
    }

    async fn generate_stream(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream> {
        let prompt = flatten_messages(messages);
        self.client.generate_stream(system, &prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        self.client.generate_model()
    }
}

/// The embedding and generation providers over one shared client.
pub struct OllamaProvider {
    pub embedder: Arc<OllamaEmbedder>,
    pub llm: Arc<OllamaLlm>,
}

impl OllamaProvider {
    pub fn new(llm: LlmConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(llm)?);
        Ok(Self {
            embedder: Arc::new(OllamaEmbedder::from_client(
                Arc::clone(&client),
                embedding.dimensions,
            )),
            llm: Arc::new(OllamaLlm::from_client(client)),
        })
    }

    /// Split into the two provider handles a session needs.
    pub fn split(self) -> (Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>) {
        (self.embedder, self.llm)
    }
}
