//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = state.db.ping().await;
    Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "license-gate",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
