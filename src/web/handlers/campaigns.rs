//! Campaign control-plane handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::campaign::types::ClientTarget;
use crate::web::response_types::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartCampaignRequest {
    #[serde(rename = "campaignName", default)]
    pub name: Option<String>,
    #[serde(rename = "cobrador", default)]
    pub collector: Option<String>,
    pub clients: Vec<ClientTarget>,
}

/// `POST /api/campaigns`: create a campaign and start dialing it
pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartCampaignRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if request.clients.is_empty() {
        return Err(ApiError::BadRequest("Client list is empty".to_string()));
    }

    // The calling window is the dispatcher's checkpoint, not an admission
    // rule: a campaign started after hours is accepted and its clients
    // stay pending.
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Campaña {}", Utc::now().format("%Y-%m-%d")));
    let collector = request
        .collector
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| "Sistema".to_string());

    let campaign = state.registry.create(name, collector, request.clients);
    info!(
        campaign_id = %campaign.id,
        name = %campaign.name,
        clients = campaign.total(),
        "🚀 campaign accepted"
    );
    state.dispatcher.spawn(campaign.clone());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "campaignId": campaign.id,
            "total": campaign.total(),
            "status": campaign.status().to_string(),
        })),
    ))
}

/// `GET /api/campaigns/:id`: status view including recorded results
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let campaign = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign not found: {id}")))?;
    let summary = campaign.summary();
    serde_json::to_value(summary)
        .map(Json)
        .map_err(|_| ApiError::Internal)
}

/// `POST /api/campaigns/:id/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let campaign = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign not found: {id}")))?;
    campaign.cancel();
    info!(campaign_id = %campaign.id, "🛑 campaign cancelled");
    Ok(Json(json!({
        "campaignId": campaign.id,
        "status": campaign.status().to_string(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct TestCallRequest {
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "nombre", default = "default_test_name")]
    pub name: String,
    #[serde(rename = "saldo", default)]
    pub balance: f64,
    #[serde(rename = "tarifa", default)]
    pub minimum_payment: f64,
    #[serde(rename = "diasAtraso", default)]
    pub days_past_due: u32,
    #[serde(rename = "promotor", default)]
    pub promoter: String,
}

fn default_test_name() -> String {
    "Cliente de prueba".to_string()
}

/// `POST /api/test-call`: one-client campaign for verifying the vendor
/// account and scripts end to end
pub async fn test_call(
    State(state): State<AppState>,
    Json(request): Json<TestCallRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if request.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing phone number".to_string()));
    }

    let client = ClientTarget {
        name: request.name,
        phone: request.phone,
        balance: request.balance,
        minimum_payment: request.minimum_payment,
        days_past_due: request.days_past_due,
        promoter: request.promoter,
    };
    let campaign = state.registry.create(
        "Llamada de prueba".to_string(),
        "Sistema".to_string(),
        vec![client],
    );
    state.dispatcher.spawn(campaign.clone());

    Ok((
        StatusCode::CREATED,
        Json(json!({ "campaignId": campaign.id })),
    ))
}
