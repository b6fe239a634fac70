use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

fn resource(data: &Value, name: &str) -> Value {
    let r = &data["resources"][name];
    json!({
        "remaining": r["remaining"].as_i64().unwrap_or(-1),
        "limit": r["limit"].as_i64().unwrap_or(-1),
        "reset": r["reset"],
    })
}

/// GET /api/rate-limit - Live GitHub limits plus the tracked snapshot. Errors are reported in-body.
pub async fn rate_limit(State(state): State<AppState>) -> Json<Value> {
    let tracked = state.github.rate_limit().snapshot();
    let budget = state.github.rate_limit().budget_mode();

    match state.github.get_rate_limit().await {
        Ok(data) => Json(json!({
            "core": resource(&data, "core"),
            "search": resource(&data, "search"),
            "tracked": tracked,
            "budget_mode": budget.as_str(),
        })),
        Err(e) => {
            tracing::warn!("Rate limit lookup failed: {e:#}");
            Json(json!({
                "error": format!("{e:#}"),
                "tracked": tracked,
                "budget_mode": budget.as_str(),
            }))
        }
    }
}
