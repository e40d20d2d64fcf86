//! Health and configuration endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::web::state::AppState;

/// `GET /health`: unauthenticated liveness probe
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "campaigns": state.registry.len(),
        "active_calls": state.index.len(),
        "provider": state.config.provider.vendor,
    }))
}

/// `GET /api/config`: effective configuration with secrets redacted
pub async fn config_view(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "provider": {
            "vendor": config.provider.vendor,
            "space_url": config.provider.space_url,
            "from_number": config.provider.from_number,
            "project_id": redact(&config.provider.project_id),
            "api_token": "***",
        },
        "dialing": {
            "inter_call_delay_secs": config.dialing.inter_call_delay_secs,
            "retry_backoff_secs": config.dialing.retry_backoff_secs,
            "max_retry_rounds": config.dialing.max_retry_rounds,
            "window": {
                "start_hour": config.dialing.window.start_hour,
                "end_hour": config.dialing.window.end_hour,
                "utc_offset_hours": config.dialing.window.utc_offset_hours,
                "include_sunday": config.dialing.window.include_sunday,
            },
        },
        "reporting": {
            "sink_configured": config.reporting.sink_url.is_some(),
        },
        "audio": {
            "renderer_configured": config.audio.renderer_url.is_some(),
        },
    }))
}

/// Keep just enough of an identifier to recognize it
fn redact(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_only_the_tail() {
        assert_eq!(redact("abcdef123456"), "***3456");
        assert_eq!(redact("abc"), "***");
    }

    #[test]
    fn redact_counts_characters_not_bytes() {
        assert_eq!(redact("ñandú-1234"), "***1234");
        assert_eq!(redact("ñúñé"), "***");
        assert_eq!(redact("añañañ"), "***añañ");
    }
}
