//! # Campaign Registry
//!
//! Owns all campaign and per-client result state for the process lifetime.
//! The load-bearing piece is [`ResultSlot`]: an attempt-scoped claim-once
//! cell that makes terminal-outcome recording idempotent no matter how many
//! asynchronous events describe the same call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use super::types::{CallOutcome, CallRecord, CampaignStatus, ClientTarget};

/// Attempt-scoped claim-once result cell.
///
/// `arm` opens one recording opportunity per dial attempt; the first
/// `claim` after an arm wins, every later claim for the same attempt is a
/// no-op. Claims without a prior arm (events for a never-dispatched
/// client) are rejected.
#[derive(Debug, Default)]
pub struct ResultSlot {
    inner: Mutex<SlotInner>,
}

#[derive(Debug, Default)]
struct SlotInner {
    attempt: u32,
    records: Vec<CallRecord>,
}

impl ResultSlot {
    /// Open a recording opportunity for a new dial attempt
    pub fn arm(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.attempt += 1;
        inner.attempt
    }

    /// Try to record a terminal result for the current attempt.
    /// Returns `Some(first_for_client)` when the claim won, `None` when the
    /// attempt already has a result (or was never armed).
    fn claim(&self, record: CallRecord) -> Option<bool> {
        let mut inner = self.inner.lock();
        if inner.records.len() as u32 >= inner.attempt {
            return None;
        }
        inner.records.push(record);
        Some(inner.records.len() == 1)
    }

    pub fn latest(&self) -> Option<CallRecord> {
        self.inner.lock().records.last().cloned()
    }

    pub fn history(&self) -> Vec<CallRecord> {
        self.inner.lock().records.clone()
    }
}

/// One outbound campaign: an ordered client list plus its mutable
/// dispatch state
pub struct Campaign {
    pub id: String,
    pub name: String,
    /// Collector who launched the campaign
    pub collector: String,
    pub clients: Vec<ClientTarget>,
    pub created_at: DateTime<Utc>,
    status: RwLock<CampaignStatus>,
    slots: Vec<ResultSlot>,
    clients_resolved: AtomicUsize,
    next_retry_at: RwLock<Option<DateTime<Utc>>>,
}

impl Campaign {
    fn new(name: String, collector: String, clients: Vec<ClientTarget>) -> Self {
        let slots = clients.iter().map(|_| ResultSlot::default()).collect();
        Self {
            id: format!("camp_{}", Uuid::new_v4().simple()),
            name,
            collector,
            clients,
            created_at: Utc::now(),
            status: RwLock::new(CampaignStatus::Running),
            slots,
            clients_resolved: AtomicUsize::new(0),
            next_retry_at: RwLock::new(None),
        }
    }

    pub fn status(&self) -> CampaignStatus {
        *self.status.read()
    }

    /// Update status. Cancellation takes precedence: once cancelled, only
    /// `cancel` itself is observed.
    pub fn set_status(&self, status: CampaignStatus) {
        let mut guard = self.status.write();
        if guard.is_cancelled() {
            return;
        }
        *guard = status;
    }

    pub fn cancel(&self) {
        *self.status.write() = CampaignStatus::Cancelled;
    }

    pub fn is_cancelled(&self) -> bool {
        self.status().is_cancelled()
    }

    /// Mark the campaign finished, preserving cancellation
    pub fn finish(&self) {
        self.set_status(CampaignStatus::Completed);
        *self.next_retry_at.write() = None;
    }

    pub fn set_next_retry_at(&self, at: Option<DateTime<Utc>>) {
        *self.next_retry_at.write() = at;
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        *self.next_retry_at.read()
    }

    /// Open a recording opportunity before dialing a client
    pub fn arm_slot(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.arm();
        }
    }

    /// Claim-once write of a terminal result. Returns `true` when this call
    /// recorded the result, `false` when it was already recorded (no-op).
    pub fn claim_result(&self, index: usize, record: CallRecord) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        match slot.claim(record) {
            Some(first_for_client) => {
                if first_for_client {
                    self.clients_resolved.fetch_add(1, Ordering::SeqCst);
                }
                true
            }
            None => false,
        }
    }

    pub fn latest_outcome(&self, index: usize) -> Option<CallOutcome> {
        self.slots.get(index)?.latest().map(|r| r.outcome)
    }

    /// Clients whose most recent outcome is recoverable
    pub fn retry_pending(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.latest()
                    .filter(|record| record.outcome.is_retryable())
                    .map(|_| i)
            })
            .collect()
    }

    pub fn total(&self) -> usize {
        self.clients.len()
    }

    /// Clients with at least one recorded terminal outcome
    pub fn completed(&self) -> usize {
        self.clients_resolved.load(Ordering::SeqCst)
    }

    /// All recorded results across attempts, in claim order per client
    pub fn results(&self) -> Vec<CallRecord> {
        self.slots.iter().flat_map(|slot| slot.history()).collect()
    }

    /// Status view served by the control API. Excludes the raw client list.
    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            collector: self.collector.clone(),
            status: self.status(),
            total: self.total(),
            completed: self.completed(),
            next_retry: self.next_retry_at(),
            created: self.created_at,
            results: self.results(),
        }
    }
}

/// Serializable campaign status view
#[derive(Debug, Serialize)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "cobrador")]
    pub collector: String,
    pub status: CampaignStatus,
    pub total: usize,
    pub completed: usize,
    #[serde(rename = "nextRetry")]
    pub next_retry: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub results: Vec<CallRecord>,
}

/// Process-lifetime owner of every campaign
#[derive(Default)]
pub struct CampaignRegistry {
    campaigns: DashMap<String, Arc<Campaign>>,
}

impl CampaignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        name: String,
        collector: String,
        clients: Vec<ClientTarget>,
    ) -> Arc<Campaign> {
        let campaign = Arc::new(Campaign::new(name, collector, clients));
        self.campaigns
            .insert(campaign.id.clone(), campaign.clone());
        campaign
    }

    pub fn get(&self, id: &str) -> Option<Arc<Campaign>> {
        self.campaigns.get(id).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(campaign_id: &str, index: usize, outcome: CallOutcome) -> CallRecord {
        CallRecord {
            timestamp: Utc::now(),
            name: format!("Cliente {index}"),
            phone: "+525512345678".to_string(),
            balance: 1000.0,
            days_past_due: 10,
            promoter: String::new(),
            outcome,
            detail: String::new(),
            collector: "Sistema".to_string(),
            campaign_id: campaign_id.to_string(),
            client_index: index,
        }
    }

    fn one_client_campaign() -> Arc<Campaign> {
        let registry = CampaignRegistry::new();
        registry.create(
            "Test".to_string(),
            "Sistema".to_string(),
            vec![ClientTarget {
                name: "Cliente".to_string(),
                phone: "5512345678".to_string(),
                balance: 1000.0,
                minimum_payment: 100.0,
                days_past_due: 10,
                promoter: String::new(),
            }],
        )
    }

    #[test]
    fn result_slot_is_claim_once_per_attempt() {
        let campaign = one_client_campaign();
        campaign.arm_slot(0);
        assert!(campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::PromiseToPay)));
        // A later disconnect event for the same call must be a no-op
        assert!(!campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::Completed)));
        assert_eq!(campaign.latest_outcome(0), Some(CallOutcome::PromiseToPay));
        assert_eq!(campaign.completed(), 1);
    }

    #[test]
    fn unarmed_slot_rejects_claims() {
        let campaign = one_client_campaign();
        assert!(!campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::Error)));
        assert_eq!(campaign.completed(), 0);
    }

    #[test]
    fn rearming_allows_a_retry_result_without_double_counting() {
        let campaign = one_client_campaign();
        campaign.arm_slot(0);
        assert!(campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::NoAnswer)));
        assert_eq!(campaign.completed(), 1);

        campaign.arm_slot(0);
        assert!(campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::PromiseToPay)));
        assert!(!campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::Completed)));

        assert_eq!(campaign.latest_outcome(0), Some(CallOutcome::PromiseToPay));
        assert_eq!(campaign.completed(), 1, "completed counts clients, not attempts");
        assert_eq!(campaign.results().len(), 2);
    }

    #[test]
    fn retry_pending_selects_only_retryable_latest_outcomes() {
        let registry = CampaignRegistry::new();
        let clients: Vec<ClientTarget> = (0..4)
            .map(|i| ClientTarget {
                name: format!("Cliente {i}"),
                phone: format!("55123456{i:02}"),
                balance: 0.0,
                minimum_payment: 0.0,
                days_past_due: 0,
                promoter: String::new(),
            })
            .collect();
        let campaign = registry.create("Test".to_string(), "Sistema".to_string(), clients);

        for i in 0..4 {
            campaign.arm_slot(i);
        }
        campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::PromiseToPay));
        campaign.claim_result(1, record(&campaign.id, 1, CallOutcome::NoAnswer));
        campaign.claim_result(2, record(&campaign.id, 2, CallOutcome::Error));
        // client 3: still pending, no result yet

        assert_eq!(campaign.retry_pending(), vec![1]);
    }

    #[test]
    fn cancellation_takes_precedence_over_completion() {
        let campaign = one_client_campaign();
        campaign.cancel();
        campaign.finish();
        assert_eq!(campaign.status(), CampaignStatus::Cancelled);
    }

    #[test]
    fn summary_excludes_clients_and_counts_results() {
        let campaign = one_client_campaign();
        campaign.arm_slot(0);
        campaign.claim_result(0, record(&campaign.id, 0, CallOutcome::AlreadyPaid));
        let summary = campaign.summary();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.results.len(), 1);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("clients").is_none());
        assert_eq!(json["status"], "running");
    }
}
