//! Origin callback registry and the approval notifier.

use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::database::models::{Endpoint, WhitelistEntry};
use crate::database::{Store, StoreError};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Callback request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Callback responded with status {0}")]
    Status(u16),
}

/// Immutable origin tag → callback URL map.
pub type EndpointMap = HashMap<String, String>;

/// Process-wide view of the configured endpoints.
///
/// Readers clone the current `Arc` and keep a complete map for as long as
/// they hold it; writers build a fresh map and swap the pointer.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    current: Arc<RwLock<Arc<EndpointMap>>>,
    reload_lock: Arc<Mutex<()>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<EndpointMap> {
        self.current.read().clone()
    }

    pub fn lookup(&self, origin: &str) -> Option<String> {
        self.snapshot().get(origin).cloned()
    }

    pub fn publish(&self, endpoints: &[Endpoint]) {
        let map: EndpointMap = endpoints
            .iter()
            .map(|e| (e.name.clone(), e.url.clone()))
            .collect();
        *self.current.write() = Arc::new(map);
    }

    /// Re-reads every endpoint from the store and publishes the result.
    /// Concurrent reloads are serialized so the last write always wins.
    pub async fn reload(&self, store: &dyn Store) -> Result<usize, StoreError> {
        let _guard = self.reload_lock.lock().await;
        let endpoints = store.list_endpoints().await?;
        self.publish(&endpoints);
        info!("Loaded {} endpoint(s)", endpoints.len());
        Ok(endpoints.len())
    }
}

/// Sends the approval callback to an origin system.
#[derive(Clone)]
pub struct WhitelistNotifier {
    client: reqwest::Client,
    message: Arc<str>,
}

impl WhitelistNotifier {
    pub fn new(timeout: Duration, message: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            message: Arc::from(message.into()),
        })
    }

    pub async fn notify(&self, url: &str, entry: &WhitelistEntry) -> Result<(), NotifyError> {
        let payload = json!({
            "chatId": entry.chat_id,
            "message": &*self.message,
        });

        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// Fire-and-forget delivery; failures are logged and never surface.
    pub fn dispatch(&self, url: String, entry: WhitelistEntry) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            match notifier.notify(&url, &entry).await {
                Ok(()) => info!(
                    "Approval for telegram id {} delivered to {}",
                    entry.telegram_id, entry.origin
                ),
                Err(e) => warn!(
                    "Approval for telegram id {} not delivered to {}: {}",
                    entry.telegram_id, entry.origin, e
                ),
            }
        })
    }
}
