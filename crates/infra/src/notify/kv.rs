//! Key/value publication of job outcomes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use scribe_core::NotifyTarget;

use super::{DeliveryError, Notification, NotificationSink};

/// A key/value store watchers can read or watch.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<(), DeliveryError>;
}

/// Publishes the terminal state name (`COMPLETED` / `FAILED`) under the target key.
pub struct KeyValueSink {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueSink {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for KeyValueSink {
    fn handles(&self, target: &NotifyTarget) -> bool {
        matches!(target, NotifyTarget::KeyValue { .. })
    }

    async fn deliver(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        match target {
            NotifyTarget::KeyValue { key } => self.store.put(key, notification.state.as_str()).await,
            other => Err(DeliveryError::Unsupported(other.describe())),
        }
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryKv {
    inner: Mutex<HashMap<String, String>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKv {
    async fn put(&self, key: &str, value: &str) -> Result<(), DeliveryError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Consul KV over its HTTP API (`PUT /v1/kv/<key>`).
#[derive(Debug, Clone)]
pub struct ConsulKv {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl ConsulKv {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_base_url(format!("http://{host}:{port}"), timeout)
    }

    pub fn with_base_url(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, DeliveryError> {
        let base_url = reqwest::Url::parse(base_url.as_ref())
            .map_err(|e| DeliveryError::KeyValue(format!("invalid consul url {:?}: {e}", base_url.as_ref())))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// `<base>/v1/kv/<key>`, each `/`-separated key segment percent-encoded.
    pub fn key_url(&self, key: &str) -> Result<reqwest::Url, DeliveryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::KeyValue(format!("consul url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "kv"])
            .extend(key.trim_start_matches('/').split('/'));
        Ok(url)
    }
}

#[async_trait]
impl KeyValueStore for ConsulKv {
    async fn put(&self, key: &str, value: &str) -> Result<(), DeliveryError> {
        let url = self.key_url(key)?;
        let response = self
            .client
            .put(url)
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| DeliveryError::KeyValue(e.to_string()))?
            .error_for_status()
            .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;

        // Consul answers `true` when the write was applied.
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;
        if body.trim() != "true" {
            return Err(DeliveryError::KeyValue(format!("consul rejected write of {key}: {body}")));
        }
        Ok(())
    }
}
