//! Vendor webhook handlers.
//!
//! Webhooks must be answered fast; event processing happens on a spawned
//! task. Instruction-expecting callbacks (`voice`, `gather`, `noinput`)
//! receive a hold document so the call stays up while the engine pushes
//! the real instruction out of band via a live-call update.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use tracing::debug;

use crate::provider::laml::LamlProvider;
use crate::web::state::AppState;

const HOLD_DOCUMENT: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Pause length=\"120\"/></Response>";

/// `POST /hooks/laml/:kind`: one route for every LaML callback kind
pub async fn laml_event(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    match LamlProvider::normalize_event(&kind, &params) {
        Some(inbound) => {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                engine
                    .handle_event(
                        inbound.handle.as_deref(),
                        inbound.phone_hint.as_deref(),
                        inbound.event,
                    )
                    .await;
            });
        }
        None => {
            debug!(kind = %kind, "unparseable webhook delivery dropped");
        }
    }

    // Status callbacks want a bare acknowledgment; everything else gets
    // the hold document.
    if kind == "status" {
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml")],
            HOLD_DOCUMENT,
        )
            .into_response()
    }
}
