//! Audio rendering collaborator.
//!
//! Given script text, produces a playable asset URL via an external TTS
//! service. Rendering is best-effort: on any failure the engine falls back
//! to a provider-native speech command instead of a pre-rendered asset.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio renderer not configured")]
    Unavailable,

    #[error("render request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait AudioRenderer: Send + Sync {
    async fn render(&self, text: &str) -> Result<String, AudioError>;
}

/// Renderer backed by an HTTP TTS service that accepts `{"text": ...}` and
/// answers `{"audioUrl": ...}`
pub struct HttpAudioRenderer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAudioRenderer {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(rename = "audioUrl")]
    audio_url: String,
}

#[async_trait]
impl AudioRenderer for HttpAudioRenderer {
    async fn render(&self, text: &str) -> Result<String, AudioError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| AudioError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AudioError::Request(format!(
                "renderer answered {}",
                response.status()
            )));
        }

        let rendered: RenderResponse = response
            .json()
            .await
            .map_err(|e| AudioError::Request(e.to_string()))?;
        Ok(rendered.audio_url)
    }
}

/// No-op renderer for deployments without a TTS service; every request
/// falls through to provider-native speech
#[derive(Default)]
pub struct DisabledRenderer;

#[async_trait]
impl AudioRenderer for DisabledRenderer {
    async fn render(&self, _text: &str) -> Result<String, AudioError> {
        Err(AudioError::Unavailable)
    }
}
