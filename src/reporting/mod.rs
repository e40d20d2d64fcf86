//! # Result Reporter
//!
//! Converts a terminal outcome into a normalized [`CallRecord`], persists
//! it in the campaign through the claim-once slot, and forwards it to the
//! external reporting sink. The forward is fire-and-forget by contract:
//! sink failures are logged locally and never retried, and never affect
//! campaign state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::campaign::registry::Campaign;
use crate::campaign::types::{CallOutcome, CallRecord};

pub struct ResultReporter {
    sink_url: Option<String>,
    http: reqwest::Client,
}

impl ResultReporter {
    pub fn new(sink_url: Option<String>) -> Self {
        Self {
            sink_url,
            http: reqwest::Client::new(),
        }
    }

    /// Record a terminal outcome for one client. Returns `true` when this
    /// call won the claim; duplicate reports of the same attempt are no-ops.
    pub fn record(
        &self,
        campaign: &Arc<Campaign>,
        client_index: usize,
        outcome: CallOutcome,
        detail: impl Into<String>,
    ) -> bool {
        let Some(client) = campaign.clients.get(client_index) else {
            warn!(
                campaign_id = %campaign.id,
                client_index = client_index,
                "result for unknown client index dropped"
            );
            return false;
        };

        let record = CallRecord {
            timestamp: Utc::now(),
            name: client.name.clone(),
            phone: client.phone.clone(),
            balance: client.balance,
            days_past_due: client.days_past_due,
            promoter: client.promoter.clone(),
            outcome,
            detail: detail.into(),
            collector: campaign.collector.clone(),
            campaign_id: campaign.id.clone(),
            client_index,
        };

        if !campaign.claim_result(client_index, record.clone()) {
            debug!(
                campaign_id = %campaign.id,
                client_index = client_index,
                outcome = %outcome,
                "result already recorded for this attempt, ignoring"
            );
            return false;
        }

        info!(
            campaign_id = %campaign.id,
            client = %record.name,
            outcome = %outcome,
            detail = %record.detail,
            "📋 RESULT recorded"
        );

        if let Some(url) = &self.sink_url {
            let http = self.http.clone();
            let url = url.clone();
            tokio::spawn(async move {
                forward_to_sink(http, url, record).await;
            });
        }
        true
    }
}

async fn forward_to_sink(http: reqwest::Client, url: String, record: CallRecord) {
    match http.post(&url).json(&record).send().await {
        Ok(response) if !response.status().is_success() => {
            warn!(
                status = %response.status(),
                campaign_id = %record.campaign_id,
                "reporting sink rejected record"
            );
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                error = %e,
                campaign_id = %record.campaign_id,
                "reporting sink unreachable, record dropped"
            );
        }
    }
}
