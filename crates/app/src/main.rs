mod server;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::{
    ingest_folder_best_effort, list_documents_with_counts, AnswerSynthesizer,
    CharacterNgramEmbedder, ChatCompletionClient, ChatCoordinator, ChunkingConfig, DocumentStore,
    Embedder, HttpEmbedder, InMemoryStore, RetrievalConfig, SimilaritySearch, SupabaseStore,
    UploadPipeline, DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_URL, DEFAULT_WORDS_PER_CHUNK,
};
use server::AppState;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Http,
    Ngram,
}

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend holding documents, chunks and the similarity search function.
    #[arg(long, value_enum, env = "PDF_CHAT_STORE", default_value = "supabase")]
    store: StoreKind,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase service or anon key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    /// Table holding one metadata row per uploaded document
    #[arg(long, default_value = "documents")]
    documents_table: String,

    /// Table holding chunk text and embeddings
    #[arg(long, default_value = "document_chunks")]
    chunks_table: String,

    /// SQL function performing similarity search
    #[arg(long, default_value = "match_documents")]
    match_function: String,

    #[arg(long, value_enum, env = "PDF_CHAT_EMBEDDER", default_value = "http")]
    embedder: EmbedderKind,

    /// Feature-extraction endpoint returning one vector per input
    #[arg(long, env = "EMBEDDING_URL", default_value = DEFAULT_EMBEDDING_URL)]
    embedding_url: String,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Use an OpenAI-compatible /embeddings request with this model instead
    #[arg(long, env = "EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// OpenAI-compatible chat completions endpoint
    #[arg(long, env = "COMPLETION_URL", default_value = DEFAULT_COMPLETION_URL)]
    completion_url: String,

    #[arg(long, env = "COMPLETION_API_KEY", hide_env_values = true)]
    completion_api_key: Option<String>,

    #[arg(long, env = "COMPLETION_MODEL", default_value = DEFAULT_COMPLETION_MODEL)]
    completion_model: String,

    #[arg(long, default_value_t = DEFAULT_WORDS_PER_CHUNK)]
    words_per_chunk: usize,

    /// Minimum similarity for a chunk to be considered a match
    #[arg(long, default_value_t = 0.1)]
    match_threshold: f64,

    /// Maximum candidates requested from similarity search
    #[arg(long, default_value_t = 15)]
    match_count: usize,

    /// Ranked candidates passed to the language model
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Chunks embedded and stored concurrently during upload
    #[arg(long, default_value_t = 1)]
    embed_concurrency: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload and chat HTTP API.
    Serve {
        #[arg(long, env = "PDF_CHAT_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Upload every PDF under a folder.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: String,
    },
    /// Ask a question against the uploaded documents.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// List uploaded documents with their chunk counts.
    Documents,
}

type StoreHandles = (Arc<dyn DocumentStore>, Arc<dyn SimilaritySearch>);

fn build_store(cli: &Cli) -> anyhow::Result<StoreHandles> {
    match cli.store {
        StoreKind::Memory => {
            let store = Arc::new(InMemoryStore::with_dimensions(cli.embedding_dimensions));
            let documents: Arc<dyn DocumentStore> = store.clone();
            let search: Arc<dyn SimilaritySearch> = store;
            Ok((documents, search))
        }
        StoreKind::Supabase => {
            let (Some(url), Some(key)) = (&cli.supabase_url, &cli.supabase_key) else {
                bail!("SUPABASE_URL and SUPABASE_KEY are required for the supabase store");
            };
            let store = Arc::new(
                SupabaseStore::new(url, key.clone())
                    .context("invalid SUPABASE_URL")?
                    .with_tables(&cli.documents_table, &cli.chunks_table)
                    .with_match_function(&cli.match_function),
            );
            let documents: Arc<dyn DocumentStore> = store.clone();
            let search: Arc<dyn SimilaritySearch> = store;
            Ok((documents, search))
        }
    }
}

fn build_embedder(cli: &Cli) -> Arc<dyn Embedder> {
    match cli.embedder {
        EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder {
            dimensions: cli.embedding_dimensions,
        }),
        EmbedderKind::Http => {
            let mut embedder = HttpEmbedder::new(&cli.embedding_url, cli.embedding_dimensions)
                .with_api_key(cli.embedding_api_key.clone());
            if let Some(model) = &cli.embedding_model {
                embedder = embedder.with_openai_model(model);
            }
            Arc::new(embedder)
        }
    }
}

fn build_synthesizer(cli: &Cli, retrieval: &RetrievalConfig) -> Arc<dyn AnswerSynthesizer> {
    let api_key = cli.completion_api_key.clone().unwrap_or_else(|| {
        warn!("COMPLETION_API_KEY is not set; answer generation will be rejected by the provider");
        String::new()
    });

    Arc::new(
        ChatCompletionClient::new(&cli.completion_url, api_key)
            .with_model(&cli.completion_model)
            .with_sampling(retrieval.temperature, retrieval.max_tokens),
    )
}

fn chunking_config(words_per_chunk: usize) -> anyhow::Result<ChunkingConfig> {
    ChunkingConfig::new(words_per_chunk).context("invalid --words-per-chunk")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let chunking = chunking_config(cli.words_per_chunk)?;
    if cli.top_k == 0 || cli.match_count == 0 {
        bail!("--top-k and --match-count must be greater than zero");
    }
    let retrieval = RetrievalConfig {
        match_threshold: cli.match_threshold,
        match_count: cli.match_count,
        top_k: cli.top_k,
        ..RetrievalConfig::default()
    };

    let (store, search) = build_store(&cli)?;
    let embedder = build_embedder(&cli);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        store = ?cli.store,
        embedder = ?cli.embedder,
        dimensions = embedder.dimensions(),
        "pdf-chat boot"
    );

    let uploads = UploadPipeline::new(store.clone(), embedder.clone())
        .with_chunking(chunking)
        .with_concurrency(cli.embed_concurrency);

    match &cli.command {
        Command::Serve { bind } => {
            let chat = ChatCoordinator::new(
                embedder,
                search,
                store.clone(),
                build_synthesizer(&cli, &retrieval),
            )
            .with_config(retrieval);

            let state = AppState {
                uploads: Arc::new(uploads),
                chat: Arc::new(chat),
                store,
            };
            server::serve(*bind, state).await?;
        }
        Command::Ingest { folder } => {
            let report = ingest_folder_best_effort(&uploads, Path::new(folder))
                .await
                .with_context(|| format!("failed to ingest {folder}"))?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    folder
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            for uploaded in &report.uploaded {
                println!(
                    "{} -> document_id={} chunks={}",
                    uploaded.filename, uploaded.document_id, uploaded.chunks
                );
            }

            let chunk_total = report
                .uploaded
                .iter()
                .map(|uploaded| uploaded.chunks)
                .sum::<usize>();
            println!(
                "{} documents, {} chunks ingested at {}",
                report.uploaded.len(),
                chunk_total,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let chat = ChatCoordinator::new(
                embedder,
                search,
                store,
                build_synthesizer(&cli, &retrieval),
            )
            .with_config(retrieval);

            let answer = chat.ask(question).await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("sources: {}", answer.sources.join(", "));
            }
            match answer.top_similarity {
                Some(similarity) => println!(
                    "matches={} best_match={:.1}%",
                    answer.matches,
                    similarity * 100.0
                ),
                None => println!("matches={}", answer.matches),
            }
        }
        Command::Documents => {
            let documents = list_documents_with_counts(store.as_ref())
                .await
                .context("failed to list documents")?;

            if documents.is_empty() {
                println!("no documents uploaded yet");
            }
            for (position, document) in documents.iter().enumerate() {
                println!(
                    "{}. {} uploaded={} chunks={} document_id={}",
                    position + 1,
                    document.filename,
                    document.uploaded_at.to_rfc3339(),
                    document.chunk_count,
                    document.document_id
                );
            }
        }
    }

    Ok(())
}
