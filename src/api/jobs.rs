use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::github::run_full_sync;
use crate::jobs::JobStatus;
use crate::scoring::drain_dirty;
use crate::state::AppState;

const SYNC_JOB: &str = "sync";
const SCORE_JOB: &str = "score";

fn already_running(name: &str) -> (StatusCode, String) {
    (StatusCode::CONFLICT, format!("Job '{name}' is already running"))
}

/// POST /api/jobs/sync - Pull repos, issues and comments in the background
pub async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    if !state.jobs.try_start(SYNC_JOB) {
        return Err(already_running(SYNC_JOB));
    }

    tokio::spawn(async move {
        let result = run_full_sync(
            &state.github,
            state.store.clone(),
            state.index.clone(),
            &state.config.repos_csv_path,
            state.sync_options(),
        )
        .await;

        match result {
            Ok(stats) => state.jobs.complete(SYNC_JOB, json!(stats)),
            Err(e) => {
                tracing::error!("Sync job failed: {e:#}");
                state.jobs.fail(SYNC_JOB, format!("{e:#}"));
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "message": "Sync job started" }))))
}

/// POST /api/jobs/score - Score every dirty issue in the background
pub async fn trigger_score(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    if !state.jobs.try_start(SCORE_JOB) {
        return Err(already_running(SCORE_JOB));
    }

    tokio::spawn(async move {
        let store = state.store.clone();
        let limit = state.config.score_batch_limit;
        let result = tokio::task::spawn_blocking(move || drain_dirty(&store, limit))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);

        match result {
            Ok(scored) => state.jobs.complete(SCORE_JOB, json!({ "scored": scored })),
            Err(e) => {
                tracing::error!("Score job failed: {e:#}");
                state.jobs.fail(SCORE_JOB, format!("{e:#}"));
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "message": "Score job started" }))))
}

/// GET /api/jobs/status/{name}
pub async fn job_status(State(state): State<AppState>, Path(name): Path<String>) -> Json<JobStatus> {
    Json(state.jobs.status(&name))
}
