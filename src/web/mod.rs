//! # Web Layer
//!
//! Two surfaces on one listener: the API-key-protected control plane under
//! `/api`, and the open vendor webhook routes under `/hooks`. `/health` is
//! open for probes.

pub mod auth;
pub mod handlers;
pub mod response_types;
pub mod state;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let control = Router::new()
        .route("/campaigns", post(handlers::campaigns::start))
        .route("/campaigns/:id", get(handlers::campaigns::status))
        .route("/campaigns/:id/cancel", post(handlers::campaigns::cancel))
        .route("/test-call", post(handlers::campaigns::test_call))
        .route("/audio/preview", post(handlers::audio::preview))
        .route("/config", get(handlers::system::config_view))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .nest("/api", control)
        .route("/hooks/laml/:kind", post(handlers::hooks::laml_event))
        .route("/health", get(handlers::system::health))
        .with_state(state)
}
