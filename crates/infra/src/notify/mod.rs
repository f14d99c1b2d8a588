//! Best-effort fan-out of terminal job outcomes.
//!
//! Every target gets its own delivery attempt. A failed or slow delivery is
//! logged and reported in the [`DispatchReport`], and nothing else: it never
//! reaches the caller as an error and never changes the job's state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scribe_core::{JobId, JobOutcome, JobRecord, JobState, NotifyTarget, ObjectRef};

pub mod kv;
#[cfg(feature = "redis")]
pub mod redis_kv;
pub mod webhook;

pub use kv::{ConsulKv, InMemoryKv, KeyValueSink, KeyValueStore};
#[cfg(feature = "redis")]
pub use redis_kv::RedisKv;
pub use webhook::WebhookSink;

/// Payload broadcast to watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub job_id: JobId,
    pub state: JobState,
    pub result: Option<JobOutcome>,
}

impl Notification {
    /// Success announcement, sent while the record is still NOTIFYING.
    pub fn completed(job_id: JobId, dest_ref: ObjectRef) -> Self {
        Self {
            job_id,
            state: JobState::Completed,
            result: Some(JobOutcome::Output { dest_ref }),
        }
    }

    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.id(),
            state: record.state(),
            result: record.result().cloned(),
        }
    }
}

/// Per-target delivery failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no sink handles target {0}")]
    Unsupported(String),
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
    #[error("http delivery failed: {0}")]
    Http(String),
    #[error("key/value publish failed: {0}")]
    KeyValue(String),
}

/// One kind of notification transport.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn handles(&self, target: &NotifyTarget) -> bool;

    async fn deliver(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<(), DeliveryError>;
}

/// Outcome of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryStatus {
    pub target: NotifyTarget,
    pub error: Option<String>,
}

impl DeliveryStatus {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub deliveries: Vec<DeliveryStatus>,
}

impl DispatchReport {
    pub fn failed_count(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.delivered()).count()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Routes each target to the first sink that handles it.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    delivery_timeout: Duration,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl NotificationDispatcher {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            delivery_timeout,
        }
    }

    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Deliver to every target concurrently. Never fails; see the report.
    pub async fn dispatch(
        &self,
        notification: &Notification,
        targets: &[NotifyTarget],
    ) -> DispatchReport {
        let deliveries = join_all(
            targets
                .iter()
                .map(|target| self.deliver_one(target, notification)),
        )
        .await;
        DispatchReport { deliveries }
    }

    async fn deliver_one(&self, target: &NotifyTarget, notification: &Notification) -> DeliveryStatus {
        let attempt = match self.sinks.iter().find(|s| s.handles(target)) {
            None => Err(DeliveryError::Unsupported(target.describe())),
            Some(sink) => {
                match tokio::time::timeout(self.delivery_timeout, sink.deliver(target, notification)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut(self.delivery_timeout)),
                }
            }
        };

        match attempt {
            Ok(()) => {
                info!(
                    job_id = %notification.job_id,
                    target = %target.describe(),
                    state = %notification.state,
                    "notification delivered"
                );
                DeliveryStatus {
                    target: target.clone(),
                    error: None,
                }
            }
            // Swallowed: delivery never affects the job.
            Err(error) => {
                warn!(
                    job_id = %notification.job_id,
                    target = %target.describe(),
                    error = %error,
                    "notification delivery failed"
                );
                DeliveryStatus {
                    target: target.clone(),
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("sinks", &self.sinks.len())
            .field("delivery_timeout", &self.delivery_timeout)
            .finish()
    }
}
