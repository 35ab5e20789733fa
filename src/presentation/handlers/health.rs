use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::application::ports::EngineStatus;
use crate::domain::EngineState;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineStatus,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.get_status().await;
    let status = if engine.state == EngineState::Loaded {
        "ok"
    } else {
        "degraded"
    };
    (StatusCode::OK, Json(HealthResponse { status, engine }))
}
