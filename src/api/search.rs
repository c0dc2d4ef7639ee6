use axum::extract::State;
use axum::Json;

use super::{run_blocking, ApiError};
use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /api/search - Hybrid search over the committed index:
///   1. Semantic + lexical candidate retrieval
///   2. RRF fusion by chunk identity
///   3. Cross-encoder reranking (when configured)
pub async fn search_repository(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let top_k = req.top_k.unwrap_or_else(|| state.engine.default_top_k());
    let query = req.query;

    let engine = state.engine.clone();
    let q = query.clone();
    let results = run_blocking(move || engine.search(&q, top_k)).await?;

    tracing::info!("Search {query:?} returned {} result(s)", results.len());
    Ok(Json(SearchResponse { query, results }))
}
