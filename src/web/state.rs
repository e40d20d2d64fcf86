//! Shared application state for the web layer.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::AudioRenderer;
use crate::campaign::{CampaignRegistry, Dispatcher};
use crate::config::DialerConfig;
use crate::correlation::CorrelationIndex;
use crate::engine::CallEngine;

/// Cloned into every handler; every field is cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DialerConfig>,
    pub registry: Arc<CampaignRegistry>,
    pub index: Arc<CorrelationIndex>,
    pub engine: Arc<CallEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub audio: Arc<dyn AudioRenderer>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<DialerConfig>,
        registry: Arc<CampaignRegistry>,
        index: Arc<CorrelationIndex>,
        engine: Arc<CallEngine>,
        dispatcher: Arc<Dispatcher>,
        audio: Arc<dyn AudioRenderer>,
    ) -> Self {
        Self {
            config,
            registry,
            index,
            engine,
            dispatcher,
            audio,
            started_at: Instant::now(),
        }
    }
}
