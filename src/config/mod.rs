//! # Dialer Configuration System
//!
//! Explicit, validated configuration for every tunable the engine exposes:
//! server binding and credentials, telephony vendor wiring, dial pacing and
//! retry policy, the operator calling window, correlation sweep timing, the
//! reporting sink, and the collection scripts.
//!
//! Values come from `config/dialer.yaml` (plus an optional per-environment
//! override file) and are overridable via `DIALER__`-prefixed environment
//! variables (`DIALER__SERVER__API_KEY`, `DIALER__PROVIDER__API_TOKEN`, ...).

pub mod loader;

use std::collections::HashMap;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

pub use loader::ConfigManager;

use crate::error::{DialerError, Result};

/// Root configuration structure mirroring config/dialer.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DialerConfig {
    /// HTTP server and API credential settings
    pub server: ServerConfig,

    /// Telephony vendor selection and credentials
    pub provider: ProviderConfig,

    /// Dispatch pacing, retry policy, and calling-window settings
    pub dialing: DialingConfig,

    /// Correlation index sweep settings
    pub correlation: CorrelationConfig,

    /// External reporting sink
    pub reporting: ReportingConfig,

    /// Audio rendering collaborator
    pub audio: AudioConfig,

    /// Collection script wording and agent directory
    pub script: ScriptConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Publicly reachable base URL, used to build webhook callback URLs
    pub public_url: String,
    /// Shared secret expected in `x-api-key` or the `api_key` query parameter
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            public_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
        }
    }
}

/// Supported telephony vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderVendor {
    Signalwire,
    Twilio,
    Mock,
}

impl ProviderVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signalwire => "signalwire",
            Self::Twilio => "twilio",
            Self::Mock => "mock",
        }
    }
}

/// Telephony provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub vendor: ProviderVendor,
    /// Vendor space domain (SignalWire), ignored for Twilio
    pub space_url: String,
    /// Project / account identifier
    pub project_id: String,
    pub api_token: String,
    /// Number the vendor dials from
    pub from_number: String,
    /// Optional verified caller-id override
    pub caller_id: Option<String>,
    pub ring_timeout_secs: u64,
    pub gather_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            vendor: ProviderVendor::Signalwire,
            space_url: String::new(),
            project_id: String::new(),
            api_token: String::new(),
            from_number: String::new(),
            caller_id: None,
            ring_timeout_secs: 30,
            gather_timeout_secs: 12,
        }
    }
}

/// Dispatch pacing and retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DialingConfig {
    /// Delay between successive dispatches within a pass
    pub inter_call_delay_secs: u64,
    /// Wait before each retry round
    pub retry_backoff_secs: u64,
    pub max_retry_rounds: u32,
    /// Prefix applied to 10-digit national numbers
    pub country_prefix: String,
    /// Minimum length of a dialable number, counting the leading `+`
    pub min_phone_len: usize,
    /// A keypress-less completed call at least this long counts as handled
    pub min_completed_call_secs: u64,
    pub window: CallWindowConfig,
}

impl Default for DialingConfig {
    fn default() -> Self {
        Self {
            inter_call_delay_secs: 8,
            retry_backoff_secs: 2 * 60 * 60,
            max_retry_rounds: 3,
            country_prefix: "52".to_string(),
            min_phone_len: 12,
            min_completed_call_secs: 20,
            window: CallWindowConfig::default(),
        }
    }
}

/// Permitted calling window in the operator's local time
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallWindowConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    /// Operator timezone as a fixed UTC offset in hours
    pub utc_offset_hours: i32,
    pub include_sunday: bool,
}

impl Default for CallWindowConfig {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 20,
            utc_offset_hours: -6,
            include_sunday: false,
        }
    }
}

impl CallWindowConfig {
    /// Operator-local timezone offset. Falls back to UTC on an out-of-range
    /// configured value; `validate` rejects those at load time.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

/// Correlation index housekeeping
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub sweep_interval_secs: u64,
    /// Entries with no activity for this long are evicted and logged
    pub inactivity_timeout_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            inactivity_timeout_secs: 600,
        }
    }
}

/// External reporting sink configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Webhook URL receiving one normalized record per terminal outcome
    pub sink_url: Option<String>,
}

/// Audio rendering collaborator configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Text-to-speech service returning a playable asset URL; when absent
    /// or failing, the engine falls back to provider-native speech
    pub renderer_url: Option<String>,
}

/// Collection script wording and the agent (gestor) directory
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Collection agency named in the scripts
    pub agency_name: String,
    /// Creditor on whose behalf the calls are made
    pub creditor_name: String,
    /// Promoter name -> agent phone for the live-transfer path
    pub agents: HashMap<String, String>,
    /// Fallback agent phone when the promoter has no directory entry
    pub default_agent_phone: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            agency_name: "Cobranza Integral".to_string(),
            creditor_name: "la institución financiera".to_string(),
            agents: HashMap::new(),
            default_agent_phone: String::new(),
        }
    }
}

impl DialerConfig {
    /// Validate cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.api_key.is_empty() {
            return Err(DialerError::Configuration(
                "server.api_key must be set".to_string(),
            ));
        }
        let w = &self.dialing.window;
        if w.start_hour >= w.end_hour || w.end_hour > 24 {
            return Err(DialerError::Configuration(format!(
                "invalid calling window: {}..{}",
                w.start_hour, w.end_hour
            )));
        }
        if !(-12..=14).contains(&w.utc_offset_hours) {
            return Err(DialerError::Configuration(format!(
                "invalid utc_offset_hours: {}",
                w.utc_offset_hours
            )));
        }
        if self.dialing.min_phone_len < 8 {
            return Err(DialerError::Configuration(
                "dialing.min_phone_len is below any dialable length".to_string(),
            ));
        }
        if !self.dialing.country_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(DialerError::Configuration(format!(
                "dialing.country_prefix must be digits, got {:?}",
                self.dialing.country_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DialerConfig {
        DialerConfig {
            server: ServerConfig {
                api_key: "secret".to_string(),
                ..ServerConfig::default()
            },
            ..DialerConfig::default()
        }
    }

    #[test]
    fn defaults_are_valid_once_api_key_is_set() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let config = DialerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut config = valid_config();
        config.dialing.window.start_hour = 20;
        config.dialing.window.end_hour = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_numeric_country_prefix_is_rejected() {
        let mut config = valid_config();
        config.dialing.country_prefix = "+52".to_string();
        assert!(config.validate().is_err());
    }
}
