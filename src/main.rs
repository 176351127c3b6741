use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use indicatif::ProgressBar;

use json_rag::config::DEFAULT_QUESTION;
use json_rag::database::qdrant_config::create_qdrant_client;
use json_rag::database::{MemoryVectorStore, QdrantVectorStore, VectorStore};
use json_rag::providers::{CompletionProvider, EmbeddingProvider, OllamaProvider, OpenAIProvider};
use json_rag::source::HttpJsonSource;
use json_rag::{Pipeline, PipelineConfig, ProviderConfig, ProviderKind, StoreKind};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Answer a question from a JSON endpoint using retrieval-augmented generation",
    long_about = None
)]
struct Args {
    /// Question to answer from the fetched data
    question: Option<String>,

    /// JSON endpoint to ingest (overrides RAG_SOURCE_URL)
    #[arg(long)]
    source_url: Option<String>,

    /// Model provider: ollama or openai (overrides RAG_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Vector store: memory or qdrant (overrides RAG_STORE)
    #[arg(long)]
    store: Option<String>,

    /// Number of chunks given to the model (overrides RAG_TOP_K)
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the retrieved chunks before the answer
    #[arg(long)]
    show_context: bool,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let question = args
        .question
        .clone()
        .unwrap_or_else(|| DEFAULT_QUESTION.to_string());

    let (completion, embedder) = build_providers(&config)?;
    log::info!("Answering with {} model {}", config.provider, completion.get_model_info().await?);
    let store = build_store(&config, embedder).await?;
    let source = HttpJsonSource::new(config.source_url()?, config.timeout)?;
    let pipeline = Pipeline::new(&config, Box::new(source), store, completion)?;

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));

    spinner.set_message("Fetching and indexing data...");
    let knowledge_base = pipeline.ingest().await;
    spinner.set_message("Answering...");
    let outcome = match knowledge_base {
        Ok(kb) => kb.ask_with_context(&question).await,
        Err(e) => Err(e),
    };
    spinner.finish_and_clear();
    let (context, answer) = outcome?;

    if args.show_context {
        println!("{}", "--- Retrieved Context ---".bright_blue().bold());
        for chunk in &context {
            println!("{}", format!("[chunk {} | score {:.3}]", chunk.chunk_index, chunk.score).dimmed());
            println!("{}\n", chunk.text);
        }
        println!("{}", "--- Answer ---".bright_blue().bold());
    }

    println!("{}", answer);
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;

    if let Some(url) = &args.source_url {
        config.source_url = Some(url.clone());
    }
    if let Some(provider) = &args.provider {
        config.provider = provider.parse()?;
    }
    if let Some(store) = &args.store {
        config.store = store.parse()?;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }

    config.validate()?;
    Ok(config)
}

fn build_providers(
    config: &PipelineConfig,
) -> Result<(Arc<dyn CompletionProvider>, Arc<dyn EmbeddingProvider>)> {
    let provider_config = ProviderConfig::from_env(config.provider, config.timeout);
    log::info!(
        "Using {} with embedding model {}",
        config.provider,
        provider_config.embedding_model
    );

    match config.provider {
        ProviderKind::Ollama => {
            let provider = Arc::new(OllamaProvider::new(&provider_config)?);
            Ok((
                provider.clone() as Arc<dyn CompletionProvider>,
                provider as Arc<dyn EmbeddingProvider>,
            ))
        }
        ProviderKind::OpenAI => {
            let provider = Arc::new(OpenAIProvider::new(&provider_config)?);
            Ok((
                provider.clone() as Arc<dyn CompletionProvider>,
                provider as Arc<dyn EmbeddingProvider>,
            ))
        }
    }
}

async fn build_store(
    config: &PipelineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryVectorStore::new(embedder, config.embed_batch_size)),
        StoreKind::Qdrant => {
            let client = create_qdrant_client(&config.qdrant_url, config.timeout)
                .await
                .context("Qdrant store selected but the server is not reachable")?;
            Arc::new(QdrantVectorStore::new(
                client,
                embedder,
                config.collection.clone(),
                config.embed_batch_size,
            ))
        }
    };
    Ok(store)
}
