mod discord;
mod engine;
mod enrichment;
mod handlers;
mod models;
mod store;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Router,
};
use engine::{EngineConfig, StickyEngine};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub struct AppState {
    pub engine: StickyEngine,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stickybot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let bot_token = std::env::var("DISCORD_BOT_TOKEN")
        .context("DISCORD_BOT_TOKEN must be set")?;
    let bot_user_id = std::env::var("BOT_USER_ID")
        .context("BOT_USER_ID must be set")?;
    let data_dir = std::env::var("DATA_DIR")
        .unwrap_or_else(|_| "data".to_string());
    let host = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("Invalid PORT")?;

    tracing::info!("Using data directory: {}", data_dir);
    let sticky_store = store::JsonFileStore::new(&data_dir);

    let discord_client = discord::DiscordClient::new(bot_token);
    let thumbnails = enrichment::PokeApiThumbnails::new();

    let engine = StickyEngine::load(
        Box::new(sticky_store),
        Arc::new(discord_client),
        Some(Arc::new(thumbnails)),
        EngineConfig {
            bot_user_id,
            ..EngineConfig::default()
        },
    );

    // Recurring archive sweep; the first tick runs immediately at startup.
    let sweep_job = engine.spawn_sweep_job();

    // Create shared application state
    let state = Arc::new(AppState {
        engine: engine.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/events", post(handlers::handle_events))
        .route("/api/sticky", get(handlers::list_stickies))
        .route(
            "/api/sticky/:channel_id",
            put(handlers::put_sticky).delete(handlers::delete_sticky),
        )
        .route("/api/sticky/:channel_id/delay", put(handlers::put_delay))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep when the server winds down.
    sweep_job.abort();
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {}", e);
    }
}

async fn health_check() -> &'static str {
    "OK"
}
