use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::models::{snippet, IssueDetailResponse, TimelineEvent};
use crate::scoring::compute_fixability_from_db;
use crate::search::issue_row_to_result;
use crate::state::AppState;

const MAX_TIMELINE_EVENTS: usize = 20;
const TIMELINE_BODY_CHARS: usize = 200;

/// GET /api/issue/{owner}/{repo}/{number} - Issue with its score breakdown and comment timeline
pub async fn issue_detail(
    State(state): State<AppState>,
    Path((owner, repo, number)): Path<(String, String, i64)>,
) -> Result<Json<IssueDetailResponse>, (StatusCode, String)> {
    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let Some(row) = store.get_issue_by_repo_and_number(&owner, &repo, number)? else {
            return Ok(None);
        };
        let comments = store.get_comments_for_issue(row.issue.issue_id)?;
        Ok(Some((row, comments)))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Issue lookup failed: {e}")))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Issue lookup failed: {e:#}")))?;

    let Some((row, comments)) = loaded else {
        return Err((StatusCode::NOT_FOUND, "Issue not found".to_string()));
    };

    let timeline_events = comments
        .into_iter()
        .take(MAX_TIMELINE_EVENTS)
        .map(|c| TimelineEvent {
            event: "commented".to_string(),
            user: c.user_login,
            author_association: c.author_association,
            body: snippet(&c.body, TIMELINE_BODY_CHARS),
            created_at: c.created_at,
        })
        .collect();

    Ok(Json(IssueDetailResponse {
        issue: issue_row_to_result(&row),
        repo_summary: row.repo.clone(),
        fixability: compute_fixability_from_db(row.fixability_score, row.grade, &row.features),
        reasons: row.reasons.clone(),
        timeline_events,
    }))
}
