//! Terminal chat over a directory of documents.
//!
//! Run with: cargo run --bin chat-rag -- ./docs

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_rag::providers::document_source::DirectorySource;
use chat_rag::{ChatSession, RagConfig};

/// Chat with your documents from the terminal.
#[derive(Parser, Debug)]
#[command(name = "chat-rag", version, about)]
struct Cli {
    /// Directory of PDF, text, and Markdown files to index.
    docs: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of chunks to retrieve per question.
    #[arg(long)]
    top_k: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RagConfig::default(),
    };
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }

    let base_url = config.llm.base_url.clone();
    let embed_model = config.llm.embed_model.clone();
    let generate_model = config.llm.generate_model.clone();

    println!("chat-rag: grounded answers from your documents\n");
    tracing::info!("model server: {}", base_url);
    tracing::info!("  - embedding model: {}", embed_model);
    tracing::info!("  - generation model: {}", generate_model);
    tracing::info!("  - chunk size: {}", config.chunking.chunk_size);
    tracing::info!("  - top-k: {}", config.retrieval.top_k);

    let mut session = ChatSession::with_ollama(config)?;

    match session.health_check().await {
        Ok(true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not reachable at {}", base_url);
            println!("Ollama does not appear to be running. To set it up:");
            println!("  1. Start the server: ollama serve");
            println!("  2. Pull the models: ollama pull {embed_model}");
            println!("                      ollama pull {generate_model}");
            println!();
        }
    }

    println!("Indexing documents from {} ...", cli.docs.display());
    let source = DirectorySource::new(cli.docs.clone());
    let report = session
        .process_documents(&source)
        .await
        .context("document processing failed")?;

    for document in &report.documents {
        println!(
            "  {} [{}]: {} page(s), {} chunk(s)",
            document.name,
            document.file_type.display_name(),
            document.pages_indexed,
            document.chunks
        );
    }
    for failure in &report.failures {
        println!("  {} skipped: {}", failure.name, failure.error);
    }
    if report.is_clean() {
        println!(
            "Indexed {} chunk(s) from {} document(s) in {} ms\n",
            report.total_chunks,
            report.documents.len(),
            report.processing_time_ms
        );
    } else {
        println!(
            "Indexed {} chunk(s) from {} of {} document(s) in {} ms\n",
            report.total_chunks,
            report.documents.len(),
            report.documents.len() + report.failures.len(),
            report.processing_time_ms
        );
    }
    println!("Ask a question, or /reset to clear the history, /quit to exit.\n");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        match question {
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("History cleared.\n");
                continue;
            }
            _ => {}
        }

        let result = session
            .handle_turn_streaming(question, |fragment| {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            })
            .await;

        match result {
            Ok(reply) => {
                println!("\n");
                if !reply.sources.is_empty() {
                    println!("Sources:");
                    for citation in &reply.sources {
                        println!("  - {}", citation.format_inline());
                    }
                    println!();
                }
            }
            Err(e) => {
                eprintln!("\nTurn failed: {e}\n");
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}
