//! # Dialer Core
//!
//! Outbound collections campaign dialer. A campaign is an ordered list of
//! debtors; the dispatcher places paced calls through a pluggable telephony
//! vendor, the call engine walks each answered call through a tiered
//! Spanish IVR script, and every call ends in exactly one recorded outcome
//! that feeds the retry scheduler and the external reporting sink.
//!
//! ## Architecture
//!
//! - **config**: layered YAML + environment configuration
//! - **script**: arrears-tiered message building (Spanish wire contract)
//! - **provider**: vendor adapter trait plus the LaML (SignalWire/Twilio)
//!   and mock implementations
//! - **correlation**: maps asynchronous vendor events back to the owning
//!   `(campaign, client)`
//! - **engine**: per-call state machine driven by canonical events
//! - **campaign**: registry, claim-once result slots, dispatcher with
//!   pacing, calling-window and retry-round policy
//! - **reporting**: normalized result records, fire-and-forget sink
//! - **web**: axum control plane and vendor webhook surface

pub mod audio;
pub mod campaign;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
pub mod reporting;
pub mod script;
pub mod web;

pub use error::{DialerError, Result};
