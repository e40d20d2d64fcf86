//! Core campaign data types: client targets, terminal outcomes, campaign
//! status, and the normalized record forwarded to the reporting sink.
//!
//! Wire tokens (field names and outcome values) match the panel and sink
//! contract, which speaks the original Spanish schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One debtor to be dialed within a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTarget {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "saldo", default)]
    pub balance: f64,
    /// Minimum payment requested in the script
    #[serde(rename = "tarifa", default)]
    pub minimum_payment: f64,
    #[serde(rename = "diasAtraso", default)]
    pub days_past_due: u32,
    /// Originating collector/agent used for the live-transfer path
    #[serde(rename = "promotor", default)]
    pub promoter: String,
}

/// Terminal result recorded exactly once per client per dial attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallOutcome {
    /// Debtor pressed 1
    #[serde(rename = "promesa_pago")]
    PromiseToPay,
    /// Debtor pressed 2 and was handed to an agent
    #[serde(rename = "transferencia")]
    Transfer,
    /// Debtor pressed 3
    #[serde(rename = "ya_pago")]
    AlreadyPaid,
    /// Debtor pressed something that is not a menu option
    #[serde(rename = "opcion_invalida")]
    InvalidSelection,
    /// Menu played but no digit arrived before the gather timeout
    #[serde(rename = "sin_respuesta")]
    NoInput,
    #[serde(rename = "no_contesto")]
    NoAnswer,
    #[serde(rename = "ocupado")]
    Busy,
    #[serde(rename = "fallida")]
    Failed,
    /// Call was cancelled at the vendor before completion
    #[serde(rename = "cancelada")]
    Canceled,
    /// Call was handled end to end without a captured keypress
    #[serde(rename = "completada")]
    Completed,
    /// Correlation entry evicted with no terminal event
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "error")]
    Error,
}

impl CallOutcome {
    /// Outcomes eligible for another dial attempt in a retry round
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoAnswer | Self::Busy | Self::NoInput | Self::Timeout | Self::Failed
        )
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::PromiseToPay => "promesa_pago",
            Self::Transfer => "transferencia",
            Self::AlreadyPaid => "ya_pago",
            Self::InvalidSelection => "opcion_invalida",
            Self::NoInput => "sin_respuesta",
            Self::NoAnswer => "no_contesto",
            Self::Busy => "ocupado",
            Self::Failed => "fallida",
            Self::Canceled => "cancelada",
            Self::Completed => "completada",
            Self::Timeout => "timeout",
            Self::Error => "error",
        };
        write!(f, "{token}")
    }
}

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Running,
    /// Backoff wait before the numbered retry round
    WaitingRetry(u32),
    /// Numbered retry round in progress
    Retrying(u32),
    Completed,
    Cancelled,
    Error,
}

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::WaitingRetry(round) => write!(f, "waiting_retry_{round}"),
            Self::Retrying(round) => write!(f, "retry_{round}"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl Serialize for CampaignStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalized record persisted per terminal outcome and forwarded to the
/// reporting sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(rename = "fecha")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "saldo")]
    pub balance: f64,
    #[serde(rename = "diasAtraso")]
    pub days_past_due: u32,
    #[serde(rename = "promotor")]
    pub promoter: String,
    #[serde(rename = "resultado")]
    pub outcome: CallOutcome,
    #[serde(rename = "detalle")]
    pub detail: String,
    #[serde(rename = "gestor")]
    pub collector: String,
    #[serde(rename = "campaignId")]
    pub campaign_id: String,
    #[serde(rename = "index")]
    pub client_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_set_matches_policy() {
        for outcome in [
            CallOutcome::NoAnswer,
            CallOutcome::Busy,
            CallOutcome::NoInput,
            CallOutcome::Timeout,
            CallOutcome::Failed,
        ] {
            assert!(outcome.is_retryable(), "{outcome} should be retryable");
        }
        for outcome in [
            CallOutcome::PromiseToPay,
            CallOutcome::Transfer,
            CallOutcome::AlreadyPaid,
            CallOutcome::InvalidSelection,
            CallOutcome::Canceled,
            CallOutcome::Completed,
            CallOutcome::Error,
        ] {
            assert!(!outcome.is_retryable(), "{outcome} should be terminal");
        }
    }

    #[test]
    fn outcome_serializes_to_wire_tokens() {
        let json = serde_json::to_string(&CallOutcome::PromiseToPay).unwrap();
        assert_eq!(json, "\"promesa_pago\"");
        let json = serde_json::to_string(&CallOutcome::NoAnswer).unwrap();
        assert_eq!(json, "\"no_contesto\"");
    }

    #[test]
    fn status_display_includes_round_numbers() {
        assert_eq!(CampaignStatus::WaitingRetry(2).to_string(), "waiting_retry_2");
        assert_eq!(CampaignStatus::Retrying(1).to_string(), "retry_1");
        assert_eq!(CampaignStatus::Running.to_string(), "running");
    }

    #[test]
    fn client_target_accepts_panel_wire_names() {
        let client: ClientTarget = serde_json::from_value(serde_json::json!({
            "nombre": "Ana López",
            "telefono": "5512345678",
            "saldo": 12500.0,
            "tarifa": 1800.0,
            "diasAtraso": 22,
            "promotor": "Nery"
        }))
        .unwrap();
        assert_eq!(client.name, "Ana López");
        assert_eq!(client.days_past_due, 22);
    }
}
