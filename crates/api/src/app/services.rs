//! Infrastructure wiring: registry, step adapters, notification sinks.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use scribe_infra::{
    inference::HttpTranscriber,
    jobs::{InMemoryJobRegistry, JobOrchestrator, PipelineExecutor, PipelineSteps},
    notify::{ConsulKv, KeyValueSink, KeyValueStore, NotificationDispatcher, WebhookSink},
    storage::ObjectStorage,
};

use crate::config::AppConfig;

pub type Orchestrator = JobOrchestrator<Arc<InMemoryJobRegistry>>;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppServices {
    pub orchestrator: Orchestrator,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("cannot build transcriber client: {0}")]
    Transcriber(String),
    #[error("cannot build notification sink: {0}")]
    Notifier(String),
    #[error("cannot open object storage: {0}")]
    Storage(String),
}

impl AppServices {
    /// Wire explicit steps and dispatcher (tests inject stubs here).
    pub fn new(steps: PipelineSteps, dispatcher: NotificationDispatcher) -> Self {
        let executor = PipelineExecutor::new(InMemoryJobRegistry::arc(), steps, dispatcher);
        Self {
            orchestrator: JobOrchestrator::new(executor),
        }
    }

    pub fn registry(&self) -> &Arc<InMemoryJobRegistry> {
        self.orchestrator.registry()
    }
}

/// Production wiring from config.
pub fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    let objects = Arc::new(
        ObjectStorage::new(&config.storage).map_err(|e| ServiceError::Storage(e.to_string()))?,
    );
    let transcriber = HttpTranscriber::new(&config.transcriber_url, config.transcribe_timeout)
        .map_err(|e| ServiceError::Transcriber(e.to_string()))?;
    let steps = PipelineSteps::new(objects.clone(), Arc::new(transcriber), objects);

    let webhook = WebhookSink::with_timeout(config.notify_timeout)
        .map_err(|e| ServiceError::Notifier(e.to_string()))?;
    let dispatcher = NotificationDispatcher::new(config.notify_timeout)
        .with_sink(webhook)
        .with_sink(KeyValueSink::new(key_value_store(config)?));

    info!(
        storage = ?config.storage,
        transcriber_url = %config.transcriber_url,
        "services wired"
    );
    Ok(AppServices::new(steps, dispatcher))
}

#[cfg(feature = "redis")]
fn key_value_store(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>, ServiceError> {
    if let Some(url) = &config.redis_url {
        let redis = scribe_infra::notify::RedisKv::new(url)
            .map_err(|e| ServiceError::Notifier(e.to_string()))?;
        info!("key/value notifications go to redis");
        return Ok(Arc::new(redis));
    }
    consul(config)
}

#[cfg(not(feature = "redis"))]
fn key_value_store(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>, ServiceError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled; using consul");
    }
    consul(config)
}

fn consul(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>, ServiceError> {
    let consul = ConsulKv::new(&config.consul_host, config.consul_port, config.notify_timeout)
        .map_err(|e| ServiceError::Notifier(e.to_string()))?;
    info!(host = %config.consul_host, port = config.consul_port, "key/value notifications go to consul");
    Ok(Arc::new(consul))
}
