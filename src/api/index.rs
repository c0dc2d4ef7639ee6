use axum::extract::State;
use axum::Json;
use std::path::PathBuf;

use super::{run_blocking, ApiError};
use crate::index::parse_repository_paths;
use crate::models::{IndexStats, RefreshRequest, RepositoryPaths};
use crate::state::AppState;

/// POST /api/index/refresh - Rebuild the index from the given roots, or
/// from the configured ones when the request names none.
pub async fn refresh_index(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<IndexStats>, ApiError> {
    let requested = body.and_then(|Json(req)| req.repository_paths);
    let roots = match requested {
        Some(paths) => roots_from_request(paths),
        None => state.config.repository_paths.clone(),
    };

    tracing::info!("Refresh requested for {} root(s)", roots.len());
    let index = state.index.clone();
    let stats = run_blocking(move || index.refresh(&roots)).await?;
    Ok(Json(stats))
}

/// GET /api/index/stats - Stats of the last committed refresh.
pub async fn get_index_stats(
    State(state): State<AppState>,
) -> Result<Json<IndexStats>, ApiError> {
    let index = state.index.clone();
    let stats = run_blocking(move || index.get_stats()).await?;
    Ok(Json(stats))
}

fn roots_from_request(paths: RepositoryPaths) -> Vec<PathBuf> {
    match paths {
        RepositoryPaths::Joined(raw) => parse_repository_paths(&raw),
        RepositoryPaths::List(list) => list
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect(),
    }
}
