pub mod issues;
pub mod jobs;
pub mod rate_limit;
pub mod search;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All HTTP routes, bound to the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search::search))
        .route("/api/issue/{owner}/{repo}/{number}", get(issues::issue_detail))
        .route("/api/jobs/sync", post(jobs::trigger_sync))
        .route("/api/jobs/score", post(jobs::trigger_score))
        .route("/api/jobs/status/{name}", get(jobs::job_status))
        .route("/api/rate-limit", get(rate_limit::rate_limit))
        .with_state(state)
}
