mod analysis;
mod artifacts;
mod config;
mod errors;
mod evidence;
mod llm_client;
mod prompts;
mod records;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::pipeline::Pipeline;
use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::llm_client::OpenAiClient;
use crate::prompts::PromptTemplates;
use crate::render::{DocumentRenderer, PdfRenderer};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stratagem API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize generation client
    let llm = OpenAiClient::new(config.openai_api_base.clone(), config.generation_timeout)?;
    info!(
        "Generation client initialized (model: {}, base: {})",
        llm_client::MODEL,
        config.openai_api_base
    );
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY not set; requests must carry their own api_key");
    }

    // Load prompt templates (embedded defaults, optional override directory)
    let prompts = PromptTemplates::load(config.prompt_templates_dir.as_deref())?;

    // Artifact store
    std::fs::create_dir_all(&config.artifact_dir)?;
    let artifacts = ArtifactStore::new(&config.artifact_dir, config.artifact_ttl);
    let purged = artifacts.purge_expired();
    info!(
        "Artifact store at {} (ttl: {:?}, purged {purged} expired)",
        artifacts.dir().display(),
        config.artifact_ttl
    );

    let renderer = PdfRenderer::new(config.render_style);
    info!("PDF render style: {}", renderer.style());

    let pipeline = Pipeline::new(
        Arc::new(llm),
        Arc::new(prompts),
        Arc::new(renderer),
        artifacts.clone(),
        config.extraction_timeout,
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        pipeline,
        artifacts,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
