use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::presentation::state::AppState;

/// OpenAI-style model listing entry.
#[derive(Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub owned_by: &'static str,
    pub directory: String,
    pub active: bool,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelEntry>,
}

pub async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    let available = state.engine.list_available().await;
    let status = state.engine.get_status().await;

    let data = available
        .into_iter()
        .map(|model| ModelEntry {
            active: status.model_id.as_deref() == Some(model.id.as_str()),
            id: model.id,
            object: "model",
            owned_by: "local",
            directory: model.directory,
        })
        .collect();

    (StatusCode::OK, Json(ModelsResponse { data }))
}

#[derive(Deserialize)]
pub struct ModelSwitchRequest {
    pub model_id: String,
}

pub async fn switch_model_handler(
    State(state): State<AppState>,
    Json(request): Json<ModelSwitchRequest>,
) -> Response {
    let available = state.engine.list_available().await;
    let available_ids: Vec<&str> = available.iter().map(|m| m.id.as_str()).collect();

    if !available_ids.contains(&request.model_id.as_str()) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("Model '{}' not found.", request.model_id),
                "available": available_ids,
            })),
        )
            .into_response();
    }

    match state.engine.load_model(&request.model_id).await {
        Ok(()) => {
            let status = state.engine.get_status().await;
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "message": format!("Switched to model: {}", request.model_id),
                    "engine": status,
                })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to switch model: {e}") })),
        )
            .into_response(),
    }
}
