//! # Campaign Dispatcher
//!
//! Drives a campaign from creation to a terminal status: one paced initial
//! pass over every client, then bounded retry rounds for the clients whose
//! latest outcome is recoverable. Dialing only happens inside the
//! configured local calling window; a pass aborts the moment the window
//! closes or the campaign is cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use tracing::{error, info, warn};

use crate::config::{CallWindowConfig, DialingConfig};
use crate::correlation::CorrelationIndex;
use crate::error::{DialerError, Result};
use crate::provider::{normalize_phone, ProviderAdapter};
use crate::reporting::ResultReporter;

use super::registry::{Campaign, CampaignRegistry};
use super::types::{CallOutcome, CampaignStatus};

/// Permitted local calling hours
#[derive(Debug, Clone)]
pub struct CallWindow {
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
    include_sunday: bool,
}

impl CallWindow {
    pub fn from_config(config: &CallWindowConfig) -> Self {
        Self {
            start_hour: config.start_hour,
            end_hour: config.end_hour,
            offset: config.offset(),
            include_sunday: config.include_sunday,
        }
    }

    /// Window open at `now`? Evaluated in the configured local offset.
    pub fn permits(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        if !self.include_sunday && local.weekday() == Weekday::Sun {
            return false;
        }
        let hour = local.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Pacing and retry policy applied to every campaign
#[derive(Debug, Clone)]
pub struct DialPolicy {
    pub inter_call_delay: Duration,
    pub retry_backoff: Duration,
    pub max_retry_rounds: u32,
    pub window: CallWindow,
    pub country_prefix: String,
    pub min_phone_len: usize,
}

impl DialPolicy {
    pub fn from_config(config: &DialingConfig) -> Self {
        Self {
            inter_call_delay: Duration::from_secs(config.inter_call_delay_secs),
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
            max_retry_rounds: config.max_retry_rounds,
            window: CallWindow::from_config(&config.window),
            country_prefix: config.country_prefix.clone(),
            min_phone_len: config.min_phone_len,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<CampaignRegistry>,
    index: Arc<CorrelationIndex>,
    provider: Arc<dyn ProviderAdapter>,
    reporter: Arc<ResultReporter>,
    policy: DialPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CampaignRegistry>,
        index: Arc<CorrelationIndex>,
        provider: Arc<dyn ProviderAdapter>,
        reporter: Arc<ResultReporter>,
        policy: DialPolicy,
    ) -> Self {
        Self {
            registry,
            index,
            provider,
            reporter,
            policy,
        }
    }

    pub fn policy(&self) -> &DialPolicy {
        &self.policy
    }

    /// Run a campaign to its terminal status on a background task
    pub fn spawn(self: &Arc<Self>, campaign: Arc<Campaign>) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let id = campaign.id.clone();
            if let Err(e) = dispatcher.run_campaign(campaign.clone()).await {
                error!(campaign_id = %id, error = %e, "campaign run aborted");
                campaign.set_status(CampaignStatus::Error);
            }
        });
    }

    /// Initial pass plus bounded retry rounds, then a terminal status
    pub async fn run_campaign(&self, campaign: Arc<Campaign>) -> Result<()> {
        info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            clients = campaign.total(),
            "🚀 campaign dispatch starting"
        );

        let all: Vec<usize> = (0..campaign.total()).collect();
        // Window closure is an expected exit: undialed clients keep no
        // recorded outcome and stay eligible for a manual restart.
        if let Err(DialerError::OutOfWindow) = self.dispatch_pass(&campaign, &all).await {
            campaign.finish();
            return Ok(());
        }

        for round in 1..=self.policy.max_retry_rounds {
            if campaign.is_cancelled() {
                break;
            }
            // All clients resolved and nothing recoverable: done. Unresolved
            // clients keep rounds scheduled; outcomes arrive while we wait.
            if campaign.completed() == campaign.total() && campaign.retry_pending().is_empty() {
                break;
            }

            campaign.set_status(CampaignStatus::WaitingRetry(round));
            let backoff = chrono::Duration::from_std(self.policy.retry_backoff)
                .unwrap_or_else(|_| chrono::Duration::zero());
            campaign.set_next_retry_at(Some(Utc::now() + backoff));
            info!(
                campaign_id = %campaign.id,
                round = round,
                backoff_secs = self.policy.retry_backoff.as_secs(),
                "⏳ retry round scheduled"
            );
            tokio::time::sleep(self.policy.retry_backoff).await;
            campaign.set_next_retry_at(None);

            if campaign.is_cancelled() {
                break;
            }
            let pending = campaign.retry_pending();
            if pending.is_empty() {
                continue;
            }

            campaign.set_status(CampaignStatus::Retrying(round));
            info!(
                campaign_id = %campaign.id,
                round = round,
                pending = pending.len(),
                "🔁 retry round dialing"
            );
            if let Err(DialerError::OutOfWindow) = self.dispatch_pass(&campaign, &pending).await {
                break;
            }
        }

        campaign.finish();
        info!(
            campaign_id = %campaign.id,
            completed = campaign.completed(),
            total = campaign.total(),
            status = %campaign.status(),
            "🏁 campaign dispatch finished"
        );
        Ok(())
    }

    /// Dial the given clients in order with pacing between calls.
    /// Checks cancellation and the calling window before every dial.
    pub async fn dispatch_pass(&self, campaign: &Arc<Campaign>, indices: &[usize]) -> Result<()> {
        for (position, &client_index) in indices.iter().enumerate() {
            if campaign.is_cancelled() {
                info!(campaign_id = %campaign.id, "campaign cancelled, pass stopped");
                return Ok(());
            }
            if !self.policy.window.permits(Utc::now()) {
                warn!(campaign_id = %campaign.id, "calling window closed, pass aborted");
                return Err(DialerError::OutOfWindow);
            }
            if position > 0 {
                tokio::time::sleep(self.policy.inter_call_delay).await;
            }
            self.dial_one(campaign, client_index).await;
        }
        Ok(())
    }

    /// Dial a single client. Dispatch failures become recorded `Error`
    /// outcomes, never pass-level failures.
    async fn dial_one(&self, campaign: &Arc<Campaign>, client_index: usize) {
        let Some(client) = campaign.clients.get(client_index) else {
            return;
        };
        campaign.arm_slot(client_index);

        let destination = match normalize_phone(
            &client.phone,
            &self.policy.country_prefix,
            self.policy.min_phone_len,
        ) {
            Ok(destination) => destination,
            Err(e) => {
                self.reporter
                    .record(campaign, client_index, CallOutcome::Error, e.to_string());
                return;
            }
        };

        let entry = self.index.bind(&campaign.id, client_index, &destination);
        match self
            .provider
            .place_call(&destination, &campaign.id, client_index)
            .await
        {
            Ok(handle) => {
                self.index.assign_handle(&entry, &handle);
                info!(
                    campaign_id = %campaign.id,
                    client = %client.name,
                    destination = %destination,
                    handle = %handle,
                    "📞 call dispatched"
                );
            }
            Err(e) => {
                self.index.release(&entry);
                self.reporter
                    .record(campaign, client_index, CallOutcome::Error, e.to_string());
            }
        }
    }

    /// Registry the dispatcher serves; handy for callers that hold only
    /// the dispatcher.
    pub fn registry(&self) -> &Arc<CampaignRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::types::ClientTarget;
    use crate::provider::mock::MockProvider;
    use chrono::TimeZone;

    fn open_window() -> CallWindow {
        CallWindow {
            start_hour: 0,
            end_hour: 24,
            offset: FixedOffset::east_opt(0).unwrap(),
            include_sunday: true,
        }
    }

    fn closed_window() -> CallWindow {
        CallWindow {
            start_hour: 8,
            end_hour: 8,
            offset: FixedOffset::east_opt(0).unwrap(),
            include_sunday: true,
        }
    }

    fn fast_policy(window: CallWindow, max_retry_rounds: u32) -> DialPolicy {
        DialPolicy {
            inter_call_delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            max_retry_rounds,
            window,
            country_prefix: "52".to_string(),
            min_phone_len: 12,
        }
    }

    fn client(name: &str, phone: &str) -> ClientTarget {
        ClientTarget {
            name: name.to_string(),
            phone: phone.to_string(),
            balance: 1000.0,
            minimum_payment: 100.0,
            days_past_due: 10,
            promoter: String::new(),
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        registry: Arc<CampaignRegistry>,
        index: Arc<CorrelationIndex>,
        provider: Arc<MockProvider>,
    }

    fn fixture(policy: DialPolicy) -> Fixture {
        let registry = Arc::new(CampaignRegistry::new());
        let index = Arc::new(CorrelationIndex::new());
        let provider = Arc::new(MockProvider::new());
        let dispatcher = Dispatcher::new(
            registry.clone(),
            index.clone(),
            provider.clone(),
            Arc::new(ResultReporter::new(None)),
            policy,
        );
        Fixture {
            dispatcher,
            registry,
            index,
            provider,
        }
    }

    #[test]
    fn window_rejects_sunday_unless_enabled() {
        let mut window = open_window();
        window.include_sunday = false;
        window.start_hour = 8;
        window.end_hour = 20;
        // 2025-06-15 is a Sunday
        let sunday_noon = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert!(!window.permits(sunday_noon));
        window.include_sunday = true;
        assert!(window.permits(sunday_noon));
    }

    #[test]
    fn window_honors_local_offset() {
        let window = CallWindow {
            start_hour: 8,
            end_hour: 20,
            offset: FixedOffset::west_opt(6 * 3600).unwrap(),
            include_sunday: true,
        };
        // 01:00 UTC is 19:00 the previous day at UTC-6: still open
        let late = Utc.with_ymd_and_hms(2025, 6, 17, 1, 0, 0).unwrap();
        assert!(window.permits(late));
        // 03:00 UTC is 21:00 at UTC-6: closed
        let closed = Utc.with_ymd_and_hms(2025, 6, 17, 3, 0, 0).unwrap();
        assert!(!window.permits(closed));
    }

    #[tokio::test]
    async fn pass_dials_every_client_in_order() {
        let f = fixture(fast_policy(open_window(), 0));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![
                client("Uno", "5512345601"),
                client("Dos", "5512345602"),
                client("Tres", "5512345603"),
            ],
        );
        f.dispatcher
            .dispatch_pass(&campaign, &[0, 1, 2])
            .await
            .unwrap();

        let placed = f.provider.placed();
        assert_eq!(placed.len(), 3);
        assert_eq!(placed[0].destination, "+525512345601");
        assert_eq!(placed[2].client_index, 2);
        assert_eq!(f.index.len(), 3);
    }

    #[tokio::test]
    async fn cancelled_campaign_places_no_calls() {
        let f = fixture(fast_policy(open_window(), 0));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        campaign.cancel();
        f.dispatcher.dispatch_pass(&campaign, &[0]).await.unwrap();
        assert!(f.provider.placed().is_empty());
    }

    #[tokio::test]
    async fn closed_window_aborts_the_pass() {
        let f = fixture(fast_policy(closed_window(), 0));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        let err = f.dispatcher.dispatch_pass(&campaign, &[0]).await.unwrap_err();
        assert!(matches!(err, DialerError::OutOfWindow));
        assert!(f.provider.placed().is_empty());
    }

    #[tokio::test]
    async fn invalid_number_records_error_without_dialing() {
        let f = fixture(fast_policy(open_window(), 0));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "12345")],
        );
        f.dispatcher.dispatch_pass(&campaign, &[0]).await.unwrap();
        assert!(f.provider.placed().is_empty());
        assert_eq!(campaign.latest_outcome(0), Some(CallOutcome::Error));
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn rejected_dispatch_records_error_and_releases_entry() {
        let f = fixture(fast_policy(open_window(), 0));
        f.provider
            .reject_destination("+525512345601", "account suspended");
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        f.dispatcher.dispatch_pass(&campaign, &[0]).await.unwrap();
        assert_eq!(campaign.latest_outcome(0), Some(CallOutcome::Error));
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn run_campaign_retries_recoverable_outcomes_up_to_round_limit() {
        let f = fixture(fast_policy(open_window(), 2));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        // A prior attempt ended in no-answer; run_campaign re-arms on each
        // dial, so the stale record keeps the client retry-eligible.
        campaign.arm_slot(0);
        campaign.claim_result(
            0,
            crate::campaign::types::CallRecord {
                timestamp: Utc::now(),
                name: "Uno".to_string(),
                phone: "5512345601".to_string(),
                balance: 1000.0,
                days_past_due: 10,
                promoter: String::new(),
                outcome: CallOutcome::NoAnswer,
                detail: String::new(),
                collector: "Sistema".to_string(),
                campaign_id: campaign.id.clone(),
                client_index: 0,
            },
        );

        f.dispatcher.run_campaign(campaign.clone()).await.unwrap();

        // Initial pass + two retry rounds
        assert_eq!(f.provider.placed().len(), 3);
        assert_eq!(campaign.status(), CampaignStatus::Completed);
        assert!(campaign.next_retry_at().is_none());
    }

    #[tokio::test]
    async fn run_campaign_with_closed_window_finishes_without_dialing() {
        let f = fixture(fast_policy(closed_window(), 3));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        f.dispatcher.run_campaign(campaign.clone()).await.unwrap();
        assert!(f.provider.placed().is_empty());
        // Clients stay pending for a manual restart; the run is not an error
        assert_eq!(campaign.status(), CampaignStatus::Completed);
        assert_eq!(campaign.completed(), 0);
    }

    #[tokio::test]
    async fn run_campaign_without_retryable_outcomes_finishes_after_one_pass() {
        let f = fixture(fast_policy(open_window(), 3));
        let campaign = f.registry.create(
            "Junio".to_string(),
            "Sistema".to_string(),
            vec![client("Uno", "5512345601")],
        );
        f.dispatcher.run_campaign(campaign.clone()).await.unwrap();
        assert_eq!(f.provider.placed().len(), 1);
        assert_eq!(campaign.status(), CampaignStatus::Completed);
    }
}
