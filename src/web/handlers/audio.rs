//! Audio preview endpoint.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::web::response_types::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub text: String,
}

/// `POST /api/audio/preview`: render arbitrary script text to a playable
/// asset URL, for checking voice and wording before a campaign goes out
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing text".to_string()));
    }
    match state.audio.render(&request.text).await {
        Ok(url) => Ok(Json(json!({ "audioUrl": url }))),
        Err(e) => Err(ApiError::Unavailable(e.to_string())),
    }
}
