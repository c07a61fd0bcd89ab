use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ai_client::{AiBackend, BackendKind};
use apify_client::ApifyClient;
use shopscout_core::{EmbeddingService, PostSource, SearchIndexer, VectorSearch};
use shopscout_domains::pipeline::{spawn_reaper, JobQueue};
use shopscout_domains::scraping::{ApifyPostSource, StoredMediaProcessor};
use shopscout_domains::search::{OpenAiEmbedder, SearchSync, TypesenseClient};
use shopscout_domains::store::PgStore;
use shopscout_domains::{Pipeline, PipelineDeps};
use shopscout_server::routes;

#[derive(Parser)]
#[command(name = "shopscout-server", about = "Instagram shop catalog extraction server")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, default_value = "./config/shopscout.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting shopscout-server");

    let cli = Cli::parse();

    let config_path = cli.config.canonicalize().with_context(|| {
        format!(
            "Config file not found: {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;
    tracing::info!(config = %config_path.display(), "Loading config");
    let file_config = shopscout_core::file_config::load_config(&config_path)?;
    let pipeline_config = file_config.pipeline.clone();

    // Secrets from env vars
    let config = shopscout_core::AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(pipeline_config.workers as u32 + 10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    let store = Arc::new(PgStore::new(pool));

    // LLM backends
    let backend: BackendKind = file_config.llm.backend.parse()?;
    let llm_key = match backend {
        BackendKind::OpenAi => config.openai_api_key.clone(),
        BackendKind::Claude => config
            .anthropic_api_key
            .clone()
            .context("ANTHROPIC_API_KEY is required for the claude backend")?,
    };
    let llm_timeout = pipeline_config.llm_timeout();
    let extraction_llm = Arc::new(AiBackend::new(
        backend,
        llm_key.clone(),
        file_config.llm.extraction_model.clone(),
        llm_timeout,
    ));
    let classification_llm = Arc::new(AiBackend::new(
        backend,
        llm_key,
        file_config.llm.classification_model.clone(),
        llm_timeout,
    ));
    tracing::info!(
        backend = ?backend,
        extraction = %file_config.llm.extraction_model,
        classification = %file_config.llm.classification_model,
        "LLM backends ready"
    );

    // Embeddings always go through OpenAI
    let openai = Arc::new(
        ai_client::OpenAi::new(config.openai_api_key.clone(), file_config.llm.extraction_model.clone())
            .with_embedding_model(file_config.llm.embedding_model.clone()),
    );
    let embedder: Arc<dyn EmbeddingService> = Arc::new(OpenAiEmbedder::new(openai));

    // Search index
    let typesense = match (&config.typesense_url, &config.typesense_api_key) {
        (Some(url), Some(key)) => Some(Arc::new(TypesenseClient::new(url.clone(), key.clone()))),
        _ => {
            tracing::warn!("Typesense not configured, category vector search and indexing disabled");
            None
        }
    };
    let vector_search = typesense.clone().map(|t| t as Arc<dyn VectorSearch>);
    let search_sync = SearchSync::new(typesense.map(|t| t as Arc<dyn SearchIndexer>));

    // Scraping
    let post_source = match &config.apify_api_key {
        Some(key) => {
            let client = ApifyClient::new(key.clone()).with_max_wait(pipeline_config.scrape_timeout());
            Some(Arc::new(ApifyPostSource::new(client)) as Arc<dyn PostSource>)
        }
        None => {
            tracing::warn!("APIFY_API_KEY not set, scraping disabled");
            None
        }
    };
    let media = Arc::new(StoredMediaProcessor::new(config.media_dir.clone()));

    let deps = PipelineDeps::builder()
        .catalog(store.clone())
        .taxonomy(store.clone())
        .runs(store)
        .extraction_llm(extraction_llm)
        .classification_llm(classification_llm)
        .post_source(post_source)
        .media(media)
        .embedder(Some(embedder))
        .vector_search(vector_search)
        .search_sync(search_sync)
        .config(pipeline_config.clone())
        .build();

    // ─── Workers ────────────────────────────────────────────────────────────

    let (queue, receiver) = JobQueue::new();
    let pipeline = Pipeline::new(deps, queue);
    let workers = pipeline.start_workers(receiver);
    tracing::info!(workers = pipeline_config.workers, "Worker pool started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = spawn_reaper(pipeline.clone(), pipeline_config.reaper_interval(), shutdown_rx);

    // ─── HTTP ───────────────────────────────────────────────────────────────

    let app = routes::build_router(pipeline, &file_config.server.allowed_origins);
    let addr = format!("0.0.0.0:{}", file_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Serving REST API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = reaper.await;
    workers.shutdown().await;
    tracing::info!("shopscout-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
