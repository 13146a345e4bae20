use axum::extract::State;
use axum::Json;
use updater_core::config::UpdateConfig;

use crate::state::AppState;

/// GET /healthz: liveness check.
pub async fn healthz() -> &'static str {
    "OK"
}

/// GET /config: the loaded update rules, for operators.
pub async fn get_config(State(app): State<AppState>) -> Json<UpdateConfig> {
    Json(app.pipeline.config().clone())
}
