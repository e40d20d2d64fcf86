//! API key authentication for the control plane.
//!
//! Clients present the key in the `x-api-key` header (preferred) or the
//! `api_key` query parameter. Webhook routes are mounted outside this
//! layer: vendors cannot carry custom headers.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::response_types::ApiError;
use super::state::AppState;

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.config.server.api_key.as_str();

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    let query_key = request.uri().query().and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "api_key")
            .map(|(_, value)| value.into_owned())
    });

    let authorized =
        header_key == Some(expected) || query_key.as_deref() == Some(expected);
    if authorized {
        return next.run(request).await;
    }

    warn!(
        path = %request.uri().path(),
        presented = header_key.is_some() || query_key.is_some(),
        "🔒 rejected request with missing or invalid API key"
    );
    ApiError::Unauthorized.into_response()
}
