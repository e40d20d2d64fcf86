//! # Call State Machine
//!
//! Consumes canonical [`CallEvent`]s for in-flight calls and decides the
//! next control command or terminal outcome. One instance serves every
//! campaign; per-call state lives in the correlation entry.
//!
//! States: `Dispatched -> Answered -> MenuPresented -> Terminal`, with
//! `Disconnected`/`ApiError` jumping to `Terminal` from anywhere. Terminal
//! is absorbing: once a client's result slot is claimed, later events for
//! the same call are observed but never cause a second write.

pub mod states;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audio::AudioRenderer;
use crate::campaign::registry::{Campaign, CampaignRegistry};
use crate::campaign::types::{CallOutcome, ClientTarget};
use crate::correlation::{CorrelationIndex, SharedEntry};
use crate::provider::{
    CallEvent, ControlCommand, DisconnectCause, Media, ProviderAdapter,
};
use crate::reporting::ResultReporter;
use crate::script::{ArrearsTier, MessageBuilder};
use states::CallState;

/// Engine knobs that are policy, not mechanism
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    pub gather_timeout_secs: u64,
    /// A keypress-less completed call at least this long counts as handled
    pub min_completed_call_secs: u64,
}

pub struct CallEngine {
    registry: Arc<CampaignRegistry>,
    index: Arc<CorrelationIndex>,
    provider: Arc<dyn ProviderAdapter>,
    reporter: Arc<ResultReporter>,
    builder: MessageBuilder,
    audio: Arc<dyn AudioRenderer>,
    policy: EnginePolicy,
}

impl CallEngine {
    pub fn new(
        registry: Arc<CampaignRegistry>,
        index: Arc<CorrelationIndex>,
        provider: Arc<dyn ProviderAdapter>,
        reporter: Arc<ResultReporter>,
        builder: MessageBuilder,
        audio: Arc<dyn AudioRenderer>,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            registry,
            index,
            provider,
            reporter,
            builder,
            audio,
            policy,
        }
    }

    /// Process one canonical event. Events that resolve to no correlation
    /// entry are orphans: logged and dropped, never fatal.
    pub async fn handle_event(
        &self,
        handle: Option<&str>,
        phone_hint: Option<&str>,
        event: CallEvent,
    ) {
        let Some(entry) = self.index.resolve(handle, phone_hint) else {
            info!(
                event = event.event_type(),
                handle = handle.unwrap_or("-"),
                phone = phone_hint.unwrap_or("-"),
                "🔍 orphan event, no correlation match"
            );
            return;
        };

        let (campaign_id, client_index, state, known_handle) = {
            let guard = entry.lock();
            (
                guard.campaign_id.clone(),
                guard.client_index,
                guard.state,
                guard.handle.clone(),
            )
        };

        let Some(campaign) = self.registry.get(&campaign_id) else {
            warn!(campaign_id = %campaign_id, "event for unknown campaign, releasing entry");
            self.index.release(&entry);
            return;
        };

        if let Some(h) = handle {
            self.index.assign_handle(&entry, h);
        }
        let handle = handle.map(str::to_string).or(known_handle);

        match event {
            CallEvent::Initiated => {
                // Handle recorded above; nothing else to do yet
            }
            CallEvent::Answered => {
                if state != CallState::Dispatched {
                    return;
                }
                self.on_answered(&campaign, client_index, &entry, handle.as_deref())
                    .await;
            }
            CallEvent::MenuPresented => {
                let mut guard = entry.lock();
                if !guard.state.is_terminal() {
                    guard.state = CallState::MenuPresented;
                }
            }
            CallEvent::DigitCaptured(digit) => {
                if state.is_terminal() {
                    return;
                }
                self.on_digit(&campaign, client_index, &entry, handle.as_deref(), digit)
                    .await;
            }
            CallEvent::NoInput => {
                if state.is_terminal() {
                    return;
                }
                self.on_no_input(&campaign, client_index, &entry, handle.as_deref())
                    .await;
            }
            CallEvent::Disconnected {
                cause,
                duration_secs,
            } => {
                let outcome = self.map_disconnect(cause, duration_secs);
                self.reporter.record(
                    &campaign,
                    client_index,
                    outcome,
                    format!("Causa: {cause}"),
                );
                entry.lock().state = CallState::Terminal;
                self.index.release(&entry);
                debug!(
                    campaign_id = %campaign.id,
                    client_index = client_index,
                    cause = %cause,
                    "📴 call disconnected, entry released"
                );
            }
            CallEvent::ApiError(detail) => {
                self.reporter
                    .record(&campaign, client_index, CallOutcome::Error, detail);
                entry.lock().state = CallState::Terminal;
                self.index.release(&entry);
            }
        }
    }

    async fn on_answered(
        &self,
        campaign: &Arc<Campaign>,
        client_index: usize,
        entry: &SharedEntry,
        handle: Option<&str>,
    ) {
        // An answer we cannot attribute to a tracked campaign call (for
        // example a live-transfer leg) gets no instructions.
        let Some(client) = campaign.clients.get(client_index) else {
            return;
        };
        let Some(handle) = handle else {
            warn!(campaign_id = %campaign.id, "answered event without call handle");
            return;
        };

        entry.lock().state = CallState::Answered;

        let script = self.builder.main_script(client, Utc::now());
        let media = self.media_for(&script).await;
        let command = ControlCommand::PlayAndGather {
            media,
            gather_timeout_secs: self.policy.gather_timeout_secs,
        };

        match self.provider.send_command(handle, command).await {
            Ok(()) => {
                entry.lock().state = CallState::MenuPresented;
                info!(
                    campaign_id = %campaign.id,
                    client = %client.name,
                    tier = ArrearsTier::for_days(client.days_past_due).label(),
                    "📩 answered, menu presented"
                );
            }
            Err(e) => {
                self.reporter
                    .record(campaign, client_index, CallOutcome::Error, e.to_string());
                entry.lock().state = CallState::Terminal;
                self.index.release(entry);
            }
        }
    }

    async fn on_digit(
        &self,
        campaign: &Arc<Campaign>,
        client_index: usize,
        entry: &SharedEntry,
        handle: Option<&str>,
        digit: char,
    ) {
        let Some(client) = campaign.clients.get(client_index) else {
            return;
        };

        let (outcome, detail) = match digit {
            '1' => (CallOutcome::PromiseToPay, "Promesa de pago".to_string()),
            '2' => (CallOutcome::Transfer, "Pidió hablar con gestor".to_string()),
            '3' => (CallOutcome::AlreadyPaid, "Ya pagó".to_string()),
            other => (CallOutcome::InvalidSelection, format!("Tecla: {other}")),
        };
        self.reporter.record(campaign, client_index, outcome, detail);
        entry.lock().state = CallState::Terminal;
        // The outcome is final; the later disconnect is an expected orphan
        self.index.release(entry);

        info!(
            campaign_id = %campaign.id,
            client = %client.name,
            digit = %digit,
            outcome = %outcome,
            "🔢 keypress captured"
        );

        let Some(handle) = handle else { return };
        let ack = self.builder.acknowledgment(digit, client);
        let media = self.media_for(&ack).await;

        let command = if outcome == CallOutcome::Transfer {
            self.transfer_command(client, media)
        } else {
            ControlCommand::PlayThenHangup { media }
        };

        if let Err(e) = self.provider.send_command(handle, command).await {
            warn!(
                campaign_id = %campaign.id,
                error = %e,
                "acknowledgment command failed after result was recorded"
            );
        }
    }

    fn transfer_command(&self, client: &ClientTarget, media: Media) -> ControlCommand {
        let agent = self.builder.agent_phone(&client.promoter);
        if agent.is_empty() {
            // No agent to dial; the acknowledgment still plays
            return ControlCommand::PlayThenHangup { media };
        }
        ControlCommand::PlayThenTransfer {
            media,
            to: agent.to_string(),
        }
    }

    async fn on_no_input(
        &self,
        campaign: &Arc<Campaign>,
        client_index: usize,
        entry: &SharedEntry,
        handle: Option<&str>,
    ) {
        self.reporter.record(
            campaign,
            client_index,
            CallOutcome::NoInput,
            "No presionó ninguna tecla",
        );
        entry.lock().state = CallState::Terminal;
        self.index.release(entry);
        info!(campaign_id = %campaign.id, client_index = client_index, "⏰ gather timed out");

        let Some(handle) = handle else { return };
        let media = self.media_for(&self.builder.no_input_script()).await;
        if let Err(e) = self
            .provider
            .send_command(handle, ControlCommand::PlayThenHangup { media })
            .await
        {
            warn!(campaign_id = %campaign.id, error = %e, "no-input farewell failed");
        }
    }

    fn map_disconnect(&self, cause: DisconnectCause, duration_secs: u64) -> CallOutcome {
        match cause {
            DisconnectCause::Busy => CallOutcome::Busy,
            DisconnectCause::NoAnswer => CallOutcome::NoAnswer,
            DisconnectCause::Failed => CallOutcome::Failed,
            DisconnectCause::Canceled => CallOutcome::Canceled,
            DisconnectCause::Completed => {
                if duration_secs >= self.policy.min_completed_call_secs {
                    CallOutcome::Completed
                } else {
                    CallOutcome::NoAnswer
                }
            }
        }
    }

    async fn media_for(&self, text: &str) -> Media {
        match self.audio.render(text).await {
            Ok(url) => Media::AudioUrl(url),
            Err(e) => {
                debug!(error = %e, "audio render failed, provider speech fallback");
                Media::Speech(text.to_string())
            }
        }
    }

    /// Periodic correlation sweep: evict inactive entries and record the
    /// stragglers as timed out so the retry scheduler can pick them up.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, max_age: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for entry in self.index.sweep(max_age) {
                let (campaign_id, client_index) = {
                    let guard = entry.lock();
                    (guard.campaign_id.clone(), guard.client_index)
                };
                warn!(
                    campaign_id = %campaign_id,
                    client_index = client_index,
                    "⏳ correlation entry timed out without terminal event"
                );
                if let Some(campaign) = self.registry.get(&campaign_id) {
                    self.reporter.record(
                        &campaign,
                        client_index,
                        CallOutcome::Timeout,
                        "Sin actividad del proveedor",
                    );
                }
            }
        }
    }
}
