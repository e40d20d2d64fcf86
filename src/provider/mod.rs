//! # Telephony Provider Adapter
//!
//! Capability boundary between campaign logic and vendor wire formats.
//! Campaign code speaks only [`ProviderAdapter`], [`ControlCommand`], and
//! the canonical [`CallEvent`]; each vendor module normalizes its payloads
//! into exactly those shapes.

pub mod laml;
pub mod mock;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Opaque identifier the vendor assigns when a call is placed
pub type CallHandle = String;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Destination failed normalization; no network call was made
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Provider rejected request: {0}")]
    ApiRejected(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),
}

/// Canonical, provider-agnostic call event
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// Call created at the vendor; the handle is now known
    Initiated,
    Answered,
    /// Menu audio confirmed playing (vendors that report it)
    MenuPresented,
    DigitCaptured(char),
    /// Gather timed out without a keypress
    NoInput,
    Disconnected {
        cause: DisconnectCause,
        duration_secs: u64,
    },
    /// Vendor-side error after dispatch
    ApiError(String),
}

impl CallEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Answered => "answered",
            Self::MenuPresented => "menu_presented",
            Self::DigitCaptured(_) => "digit_captured",
            Self::NoInput => "no_input",
            Self::Disconnected { .. } => "disconnected",
            Self::ApiError(_) => "api_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    Busy,
    NoAnswer,
    Failed,
    Canceled,
    /// Vendor reports the call ran to completion
    Completed,
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Playable content: a pre-rendered asset or provider-native speech fallback
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    AudioUrl(String),
    Speech(String),
}

/// Instruction pushed to a live call
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Play the menu and collect a single digit
    PlayAndGather {
        media: Media,
        gather_timeout_secs: u64,
    },
    PlayThenHangup {
        media: Media,
    },
    /// Acknowledgment followed by a live transfer to an agent
    PlayThenTransfer {
        media: Media,
        to: String,
    },
    Hangup,
}

/// Vendor capability interface. One implementation per vendor; campaign
/// logic depends only on this trait.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Place an outbound call to an already-normalized destination.
    async fn place_call(
        &self,
        destination: &str,
        campaign_id: &str,
        client_index: usize,
    ) -> Result<CallHandle, ProviderError>;

    /// Push an instruction to a live call.
    async fn send_command(
        &self,
        handle: &str,
        command: ControlCommand,
    ) -> Result<(), ProviderError>;
}

/// Normalize a raw phone number into dialable E.164 form.
///
/// Ten-digit national numbers get the configured country prefix; anything
/// shorter than `min_len` (counting the leading `+`) is rejected before any
/// network call.
pub fn normalize_phone(
    raw: &str,
    country_prefix: &str,
    min_len: usize,
) -> Result<String, ProviderError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = if digits.len() == 10 {
        format!("{country_prefix}{digits}")
    } else {
        digits
    };
    let normalized = format!("+{digits}");
    if normalized.len() < min_len {
        return Err(ProviderError::InvalidNumber(raw.to_string()));
    }
    Ok(normalized)
}

/// Last ten digits of a number, the fallback correlation key for vendors
/// that truncate or reformat destinations.
pub fn phone_suffix(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(10);
    digits[start..].iter().collect()
}
