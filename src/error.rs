//! Structured error handling for the dialer core.
//!
//! Every failure in this system is contained to a single client or a single
//! campaign; nothing here is fatal to the process. Provider-facing errors
//! live in [`crate::provider::ProviderError`] and are wrapped transparently.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DialerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Outside the permitted calling window")]
    OutOfWindow,

    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),
}

pub type Result<T> = std::result::Result<T, DialerError>;
