//! SafeScript Backend
//!
//! Turns one-sentence feature requests into agile user stories shaped by a
//! team's template, with SQLite persistence and per-team context digests.

mod api;
mod config;
mod context;
mod db;
mod errors;
mod models;
mod story;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use context::ContextDigests;
use db::Repository;
use story::Generator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub generator: Arc<dyn Generator>,
    pub digests: Arc<ContextDigests>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SafeScript Backend");
    tracing::info!("Data directory: {:?}", config.data_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    let generator = story::build_generator(&config);
    if config.openai_api_key.is_none() {
        tracing::warn!("No OPENAI_API_KEY configured. Stories use heuristic extraction only!");
    }
    tracing::info!("Story generator: {}", generator.name());

    // Initialize database
    let pool = db::open_database(&config.db_path()).await?;
    let repo = Arc::new(Repository::new(pool));

    // Digests are derived data; rebuild them so a crash between write and digest heals here
    let digests = Arc::new(ContextDigests::open(&config.teams_dir()));
    tracing::info!("Rebuilding team context digests...");
    match digests.rebuild_all(&repo).await {
        Ok(teams) => tracing::info!("Context digests rebuilt for {} teams", teams),
        Err(e) => tracing::warn!("Context digests not rebuilt: {}", e),
    }

    // Create application state
    let state = AppState {
        repo,
        generator,
        digests,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Stories
        .route(
            "/generate-story",
            post(api::generate_story).patch(api::tweak_story),
        )
        .route("/stories/{id}", get(api::get_story))
        .route("/teams/{team_id}/stories", get(api::list_team_stories))
        // Context
        .route("/team-context", get(api::get_team_context));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
