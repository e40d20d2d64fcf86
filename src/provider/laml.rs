//! LaML / Compatibility API adapter.
//!
//! Covers vendors speaking the Twilio-compatible wire dialect: SignalWire
//! (`https://{space}/api/laml/2010-04-01`) and Twilio itself. Outbound calls
//! go through `Calls.json`; control commands are delivered by updating the
//! live call with a fresh cXML document; inbound webhooks are normalized
//! into canonical [`CallEvent`]s.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    CallEvent, CallHandle, ControlCommand, DisconnectCause, Media, ProviderAdapter, ProviderError,
};
use crate::config::ProviderConfig;

/// A webhook delivery normalized to one canonical event plus its
/// correlation hints
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub handle: Option<String>,
    pub phone_hint: Option<String>,
    pub event: CallEvent,
}

pub struct LamlProvider {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    api_token: String,
    from_number: String,
    caller_id: Option<String>,
    public_url: String,
    ring_timeout_secs: u64,
}

impl LamlProvider {
    pub fn signalwire(config: &ProviderConfig, public_url: &str) -> Self {
        Self::new(
            format!("https://{}/api/laml/2010-04-01", config.space_url),
            config,
            public_url,
        )
    }

    pub fn twilio(config: &ProviderConfig, public_url: &str) -> Self {
        Self::new(
            "https://api.twilio.com/2010-04-01".to_string(),
            config,
            public_url,
        )
    }

    fn new(base_url: String, config: &ProviderConfig, public_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            project_id: config.project_id.clone(),
            api_token: config.api_token.clone(),
            from_number: config.from_number.clone(),
            caller_id: config.caller_id.clone(),
            public_url: public_url.trim_end_matches('/').to_string(),
            ring_timeout_secs: config.ring_timeout_secs,
        }
    }

    /// Normalize one webhook delivery. `kind` is the path segment the vendor
    /// was told to call back on; unrecognized payloads yield `None` and are
    /// dropped by the caller.
    pub fn normalize_event(kind: &str, params: &HashMap<String, String>) -> Option<InboundEvent> {
        let handle = params.get("CallSid").cloned();
        let phone_hint = params.get("To").cloned();

        let event = match kind {
            // The vendor asks for instructions once the callee answers
            "voice" => CallEvent::Answered,
            "gather" => {
                let digit = params.get("Digits")?.chars().next()?;
                CallEvent::DigitCaptured(digit)
            }
            "noinput" => CallEvent::NoInput,
            "status" => {
                let status = params.get("CallStatus")?.as_str();
                let duration_secs = params
                    .get("CallDuration")
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(0);
                match status {
                    "queued" | "initiated" | "ringing" => CallEvent::Initiated,
                    "in-progress" | "answered" => CallEvent::Answered,
                    "busy" => CallEvent::Disconnected {
                        cause: DisconnectCause::Busy,
                        duration_secs,
                    },
                    "no-answer" => CallEvent::Disconnected {
                        cause: DisconnectCause::NoAnswer,
                        duration_secs,
                    },
                    "failed" => CallEvent::Disconnected {
                        cause: DisconnectCause::Failed,
                        duration_secs,
                    },
                    "canceled" => CallEvent::Disconnected {
                        cause: DisconnectCause::Canceled,
                        duration_secs,
                    },
                    "completed" => CallEvent::Disconnected {
                        cause: DisconnectCause::Completed,
                        duration_secs,
                    },
                    other => {
                        debug!(status = %other, "unrecognized CallStatus dropped");
                        return None;
                    }
                }
            }
            other => {
                debug!(kind = %other, "unrecognized webhook kind dropped");
                return None;
            }
        };

        Some(InboundEvent {
            handle,
            phone_hint,
            event,
        })
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", self.base_url, self.project_id)
    }

    fn call_update_url(&self, handle: &str) -> String {
        format!(
            "{}/Accounts/{}/Calls/{}.json",
            self.base_url, self.project_id, handle
        )
    }

    fn cxml_for(&self, command: &ControlCommand) -> String {
        let body = match command {
            ControlCommand::PlayAndGather {
                media,
                gather_timeout_secs,
            } => format!(
                "<Gather input=\"dtmf\" numDigits=\"1\" timeout=\"{timeout}\" \
                 action=\"{public}/hooks/laml/gather\">{media}</Gather>\
                 <Redirect>{public}/hooks/laml/noinput</Redirect>",
                timeout = gather_timeout_secs,
                public = self.public_url,
                media = media_cxml(media),
            ),
            ControlCommand::PlayThenHangup { media } => {
                format!("{}<Hangup/>", media_cxml(media))
            }
            ControlCommand::PlayThenTransfer { media, to } => {
                format!("{}<Dial>{}</Dial>", media_cxml(media), escape_xml(to))
            }
            ControlCommand::Hangup => "<Hangup/>".to_string(),
        };
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>{body}</Response>")
    }
}

#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    sid: String,
}

#[async_trait]
impl ProviderAdapter for LamlProvider {
    async fn place_call(
        &self,
        destination: &str,
        campaign_id: &str,
        client_index: usize,
    ) -> Result<CallHandle, ProviderError> {
        let from = self.caller_id.as_deref().unwrap_or(&self.from_number);
        let params = [
            ("To", destination.to_string()),
            ("From", from.to_string()),
            ("Url", format!("{}/hooks/laml/voice", self.public_url)),
            (
                "StatusCallback",
                format!("{}/hooks/laml/status", self.public_url),
            ),
            ("StatusCallbackEvent", "completed".to_string()),
            ("Timeout", self.ring_timeout_secs.to_string()),
        ];

        let response = self
            .http
            .post(self.calls_url())
            .basic_auth(&self.project_id, Some(&self.api_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiRejected(format!("{status}: {body}")));
        }

        let created: CreateCallResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiRejected(e.to_string()))?;

        debug!(
            campaign_id = %campaign_id,
            client_index = client_index,
            call_sid = %created.sid,
            "call created at vendor"
        );
        Ok(created.sid)
    }

    async fn send_command(
        &self,
        handle: &str,
        command: ControlCommand,
    ) -> Result<(), ProviderError> {
        let cxml = self.cxml_for(&command);
        let response = self
            .http
            .post(self.call_update_url(handle))
            .basic_auth(&self.project_id, Some(&self.api_token))
            .form(&[("Twiml", cxml)])
            .send()
            .await
            .map_err(|e| ProviderError::NetworkFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiRejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}

fn media_cxml(media: &Media) -> String {
    match media {
        Media::AudioUrl(url) => format!("<Play>{}</Play>", escape_xml(url)),
        Media::Speech(text) => format!(
            "<Say language=\"es-MX\" voice=\"Polly.Mia\">{}</Say>",
            escape_xml(text)
        ),
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
