use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use super::AppState;

/// Returns 200 once at least one block has been observed.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.cache.stats().last_block.is_some() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    }
}

/// Cache totals plus the state of every entry.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats();
    let mut entries: Vec<serde_json::Value> = state
        .cache
        .snapshot()
        .into_iter()
        .map(|info| {
            serde_json::json!({
                "key": info.key.to_string(),
                "subscribers": info.subscribers,
                "version": info.version,
                "in_flight": info.in_flight,
                "loading": info.state.loading,
                "value": info.state.value,
                "error": info.state.error.map(|e| e.to_string()),
            })
        })
        .collect();
    entries.sort_by(|a, b| a["key"].as_str().cmp(&b["key"].as_str()));

    let body = serde_json::json!({
        "last_block": stats.last_block,
        "active_entries": stats.active_entries,
        "idle_entries": stats.idle_entries,
        "subscribers": stats.subscribers,
        "in_flight": stats.in_flight,
        "entries": entries,
    });

    (StatusCode::OK, Json(body))
}
