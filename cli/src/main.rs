use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use baggage_cli::{ChatOutcome, chat_loop, download_all, init_logging};
use baggage_ollama::ModelServerManager;
use baggage_retrieval::{EmbeddingProviderType, RagConfig, RetrievalOrchestrator, build_index};

#[derive(Parser)]
#[command(
    name = "baggage-rag",
    about = "Answer airline baggage policy questions from local documents",
    version
)]
struct Cli {
    /// Configuration file (default: ./baggage-rag.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the configured policy pages into the documents directory
    Download,

    /// Chunk and embed the documents, then write the index snapshot
    Build,

    /// Answer a single question
    Ask {
        /// The question
        question: String,
    },

    /// Interactive question loop
    Chat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Download => download(&config).await,
        Command::Build => build(&config).await,
        Command::Ask { question } => ask(&config, &question).await,
        Command::Chat => chat(&config).await,
    }
}

async fn download(config: &RagConfig) -> Result<()> {
    let summary = download_all(&config.download, &config.documents.dir).await?;
    println!(
        "Download complete: {}/{} files",
        summary.saved.len(),
        summary.total()
    );
    for (name, reason) in &summary.failed {
        println!("  failed: {name} ({reason})");
    }
    Ok(())
}

async fn build(config: &RagConfig) -> Result<()> {
    let provider = config.embedding_provider()?;

    // Embeddings come from the model server, so it has to be up first
    let server = match config.embedding.provider {
        EmbeddingProviderType::Ollama => {
            let manager = ModelServerManager::new(config.server.clone());
            manager
                .ensure_running(&config.embedding.model)
                .await
                .context("cannot start the model server for embeddings")?;
            Some(manager)
        }
        EmbeddingProviderType::Hashing => None,
    };

    let result = build_index(config, provider.as_ref()).await;
    if let Some(server) = server {
        server.shutdown().await;
    }
    let report = result?;

    if report.placeholder {
        println!(
            "No documents found in {}; wrote a placeholder index",
            config.documents.dir.display()
        );
    }
    println!(
        "Indexed {} chunks from {} documents (dimension {}, build {})",
        report.chunks, report.documents, report.dimension, report.build_id
    );
    println!("Snapshot written to {}", config.index.dir.display());
    Ok(())
}

async fn start_assistant(config: &RagConfig) -> Result<RetrievalOrchestrator> {
    let assistant = RetrievalOrchestrator::from_config(config)?;
    if let Err(err) = assistant.start().await {
        assistant.shutdown().await;
        return Err(err.into());
    }
    Ok(assistant)
}

async fn ask(config: &RagConfig, question: &str) -> Result<()> {
    let assistant = start_assistant(config).await?;
    let answer = assistant.answer(question).await;
    println!("{answer}");
    assistant.shutdown().await;
    Ok(())
}

async fn chat(config: &RagConfig) -> Result<()> {
    let assistant = start_assistant(config).await?;

    let input = BufReader::new(tokio::io::stdin());
    let outcome = tokio::select! {
        outcome = chat_loop(&assistant, input, tokio::io::stdout()) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    assistant.shutdown().await;
    match outcome {
        Some(Ok(ChatOutcome::Quit | ChatOutcome::EndOfInput)) | None => {
            info!("Chat session ended");
            println!("\nGoodbye!");
            Ok(())
        }
        Some(Err(err)) => Err(err).context("chat input failed"),
    }
}
