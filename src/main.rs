use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use repo_rag::api;
use repo_rag::config::Config;
use repo_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Embedding provider: {} ({})", config.llm.provider, config.llm.base_url);
    if config.repository_paths.is_empty() {
        tracing::info!("No default repository roots; refresh requests must name them");
    }

    // Blocking HTTP clients must not be built on a runtime thread
    let bind_addr = config.bind_addr.clone();
    let state = tokio::task::spawn_blocking(move || AppState::new(config)).await??;

    let app = Router::new()
        .route("/api/index/refresh", post(api::index::refresh_index))
        .route("/api/index/stats", get(api::index::get_index_stats))
        .route("/api/search", post(api::search::search_repository))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
