use axum::extract::State;
use axum::Json;

use crate::models::{SearchRequest, SearchResponse};
use crate::search::search_issues;
use crate::state::AppState;

/// POST /api/search - Full-text match, conjunctive filters, then ranking:
///   - `sort_by = "fixability"`: persisted score, descending
///   - anything else: blend of lexical relevance and fixability
///
/// Failures come back as an empty result set, never as an error status.
pub async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Json<SearchResponse> {
    let rate_limit = state.github.rate_limit().snapshot();
    let weights = state.blend_weights();
    let store = state.store.clone();
    let index = state.index.clone();

    let response = tokio::task::spawn_blocking(move || {
        search_issues(&store, &index, weights, &req, rate_limit)
    })
    .await
    .unwrap_or_else(|e| {
        tracing::error!("Search task failed: {e}");
        SearchResponse {
            rate_limit: state.github.rate_limit().snapshot(),
            ..SearchResponse::default()
        }
    });

    Json(response)
}
