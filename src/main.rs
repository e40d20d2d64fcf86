//! Dialer server binary: loads configuration, wires the components, and
//! serves the control plane plus vendor webhooks on one listener.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use dialer_core::audio::{AudioRenderer, DisabledRenderer, HttpAudioRenderer};
use dialer_core::campaign::{CampaignRegistry, DialPolicy, Dispatcher};
use dialer_core::config::{ConfigManager, ProviderVendor};
use dialer_core::correlation::CorrelationIndex;
use dialer_core::engine::{CallEngine, EnginePolicy};
use dialer_core::logging::init_structured_logging;
use dialer_core::provider::laml::LamlProvider;
use dialer_core::provider::mock::MockProvider;
use dialer_core::provider::ProviderAdapter;
use dialer_core::reporting::ResultReporter;
use dialer_core::script::MessageBuilder;
use dialer_core::web::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load configuration")?;
    info!(environment = manager.environment(), "⚙️ configuration loaded");
    let config = Arc::new(manager.into_config());

    let provider: Arc<dyn ProviderAdapter> = match config.provider.vendor {
        ProviderVendor::Signalwire => Arc::new(LamlProvider::signalwire(
            &config.provider,
            &config.server.public_url,
        )),
        ProviderVendor::Twilio => Arc::new(LamlProvider::twilio(
            &config.provider,
            &config.server.public_url,
        )),
        ProviderVendor::Mock => Arc::new(MockProvider::new()),
    };

    let audio: Arc<dyn AudioRenderer> = match &config.audio.renderer_url {
        Some(url) => Arc::new(HttpAudioRenderer::new(url.clone())),
        None => Arc::new(DisabledRenderer),
    };

    let registry = Arc::new(CampaignRegistry::new());
    let index = Arc::new(CorrelationIndex::new());
    let reporter = Arc::new(ResultReporter::new(config.reporting.sink_url.clone()));
    let builder = MessageBuilder::new(&config.script, config.dialing.window.offset());

    let engine = Arc::new(CallEngine::new(
        registry.clone(),
        index.clone(),
        provider.clone(),
        reporter.clone(),
        builder,
        audio.clone(),
        EnginePolicy {
            gather_timeout_secs: config.provider.gather_timeout_secs,
            min_completed_call_secs: config.dialing.min_completed_call_secs,
        },
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        index.clone(),
        provider,
        reporter,
        DialPolicy::from_config(&config.dialing),
    ));

    tokio::spawn(engine.clone().run_sweeper(
        Duration::from_secs(config.correlation.sweep_interval_secs),
        Duration::from_secs(config.correlation.inactivity_timeout_secs),
    ));

    let state = AppState::new(config.clone(), registry, index, engine, dispatcher, audio);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!(
        address = %config.server.bind_address,
        vendor = ?config.provider.vendor,
        "🚀 dialer server listening"
    );
    axum::serve(listener, app)
        .await
        .context("server terminated")?;
    Ok(())
}
