//! Scripted in-memory provider used by unit and integration tests, and as
//! the `mock` vendor for local development without a telephony account.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CallHandle, ControlCommand, ProviderAdapter, ProviderError};

/// A call accepted by the mock vendor
#[derive(Debug, Clone)]
pub struct PlacedCall {
    pub destination: String,
    pub campaign_id: String,
    pub client_index: usize,
    pub handle: CallHandle,
}

/// A control command the mock vendor received
#[derive(Debug, Clone)]
pub struct IssuedCommand {
    pub handle: String,
    pub command: ControlCommand,
}

#[derive(Default)]
pub struct MockProvider {
    rejections: Mutex<HashMap<String, String>>,
    placed: Mutex<Vec<PlacedCall>>,
    issued: Mutex<Vec<IssuedCommand>>,
    next_handle: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an `ApiRejected` response for a destination
    pub fn reject_destination(&self, destination: impl Into<String>, reason: impl Into<String>) {
        self.rejections
            .lock()
            .insert(destination.into(), reason.into());
    }

    pub fn placed(&self) -> Vec<PlacedCall> {
        self.placed.lock().clone()
    }

    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.issued.lock().clone()
    }

    /// Handle assigned to the nth accepted call
    pub fn handle_for(&self, n: usize) -> Option<CallHandle> {
        self.placed.lock().get(n).map(|c| c.handle.clone())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn place_call(
        &self,
        destination: &str,
        campaign_id: &str,
        client_index: usize,
    ) -> Result<CallHandle, ProviderError> {
        if let Some(reason) = self.rejections.lock().get(destination) {
            return Err(ProviderError::ApiRejected(reason.clone()));
        }
        let handle = format!("mock-{}", self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.placed.lock().push(PlacedCall {
            destination: destination.to_string(),
            campaign_id: campaign_id.to_string(),
            client_index,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    async fn send_command(
        &self,
        handle: &str,
        command: ControlCommand,
    ) -> Result<(), ProviderError> {
        self.issued.lock().push(IssuedCommand {
            handle: handle.to_string(),
            command,
        });
        Ok(())
    }
}
