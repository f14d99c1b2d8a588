//! Pipeline executor: drives one job through fetch → transform → store → notify.
//!
//! Each transition is written to the registry before the next step starts, so a
//! poller always sees the latest completed step. A step failure marks the job
//! FAILED with that step as the stage and stops the pipeline. Transient
//! artifacts are owned values and are released by scope on every exit path.
//! A step that panics fails the job the same way a step error does.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, info, warn};

use scribe_core::{JobId, JobMutation, JobRecord, JobState};

use super::registry::{JobRegistry, RegistryError};
use super::steps::PipelineSteps;
use crate::notify::{Notification, NotificationDispatcher};

/// How one pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed { stage: JobState, message: String },
    /// The record vanished (evicted) or refused the run (already started).
    Abandoned,
}

/// Marker for "stop quietly, the record is gone or not ours".
struct Abandon;

/// Runs pipelines against a registry.
pub struct PipelineExecutor<R: JobRegistry> {
    registry: R,
    steps: PipelineSteps,
    dispatcher: NotificationDispatcher,
}

impl<R: JobRegistry> PipelineExecutor<R> {
    pub fn new(registry: R, steps: PipelineSteps, dispatcher: NotificationDispatcher) -> Self {
        Self {
            registry,
            steps,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Run the pipeline for `id` to a terminal state (or abandon it).
    pub async fn run(&self, id: JobId) -> RunOutcome {
        let record = match self.registry.get(id) {
            Ok(record) => record,
            Err(e) => {
                debug!(job_id = %id, error = %e, "job gone before it started");
                return RunOutcome::Abandoned;
            }
        };

        match self.drive(&record).await {
            Ok(outcome) => outcome,
            Err(Abandon) => RunOutcome::Abandoned,
        }
    }

    async fn drive(&self, record: &JobRecord) -> Result<RunOutcome, Abandon> {
        let id = record.id();

        self.transition(id, JobMutation::Advance(JobState::Fetching))?;
        let artifact = match guarded(self.steps.fetcher.fetch(record.source_ref())).await {
            Ok(artifact) => artifact,
            Err(message) => return self.fail(id, message).await,
        };

        self.transition(id, JobMutation::Advance(JobState::Transforming))?;
        let transcript = guarded(self.steps.transcriber.transcribe(&artifact)).await;
        drop(artifact);
        let transcript = match transcript {
            Ok(transcript) => transcript,
            Err(message) => return self.fail(id, message).await,
        };

        self.transition(id, JobMutation::Advance(JobState::Storing))?;
        if let Err(message) = guarded(self.steps.store.store(record.dest_ref(), &transcript)).await {
            return self.fail(id, message).await;
        }
        drop(transcript);

        self.transition(id, JobMutation::Advance(JobState::Notifying))?;
        let notification = Notification::completed(id, record.dest_ref().clone());
        let report = self
            .dispatcher
            .dispatch(&notification, record.notify_targets())
            .await;
        if !report.all_delivered() {
            // Advisory only: the job completes regardless.
            debug!(
                job_id = %id,
                failed = report.failed_count(),
                "ignoring failed notification deliveries"
            );
        }

        self.transition(id, JobMutation::Complete)?;
        info!(job_id = %id, dest = %record.dest_ref(), "job completed");
        Ok(RunOutcome::Completed)
    }

    async fn fail(&self, id: JobId, message: String) -> Result<RunOutcome, Abandon> {
        let failed = self.transition(id, JobMutation::fail(message.clone()))?;
        let stage = failed
            .result()
            .and_then(|r| r.stage())
            .unwrap_or(JobState::Failed);
        warn!(job_id = %id, stage = %stage, error = %message, "job failed");

        let report = self
            .dispatcher
            .dispatch(&Notification::from_record(&failed), failed.notify_targets())
            .await;
        if !report.all_delivered() {
            debug!(
                job_id = %id,
                failed = report.failed_count(),
                "ignoring failed notification deliveries"
            );
        }

        Ok(RunOutcome::Failed { stage, message })
    }

    fn transition(&self, id: JobId, mutation: JobMutation) -> Result<JobRecord, Abandon> {
        match self.registry.update(id, mutation) {
            Ok(record) => {
                debug!(job_id = %id, state = %record.state(), "job state recorded");
                Ok(record)
            }
            Err(RegistryError::NotFound(_)) => {
                debug!(job_id = %id, "job evicted mid-flight; abandoning");
                Err(Abandon)
            }
            Err(RegistryError::Transition(e)) => {
                warn!(job_id = %id, error = %e, "job refused transition; abandoning");
                Err(Abandon)
            }
        }
    }
}

/// Await a step, turning both its error and a panic into the failure message.
async fn guarded<T, E: Display>(step: impl Future<Output = Result<T, E>>) -> Result<T, String> {
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => Err(format!("step panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use scribe_core::{JobRequest, NotifyTarget, ObjectRef, Transcript};

    use crate::jobs::registry::InMemoryJobRegistry;
    use crate::jobs::steps::{
        ArtifactFetcher, FetchError, LocalArtifact, StoreError, TranscriptStore, Transcriber,
        TransformError,
    };
    use crate::notify::{DeliveryError, InMemoryKv, KeyValueSink, NotificationSink};

    /// Scripted steps that count calls and record the registry state seen at each call.
    struct Script {
        registry: Arc<InMemoryJobRegistry>,
        fetch: Result<&'static str, &'static str>,
        transform: Result<&'static str, &'static str>,
        store: Result<(), &'static str>,
        /// Panic with this message instead of transcribing.
        transform_panics: Option<&'static str>,
        /// Evict every record from the registry while fetching.
        evict_on_fetch: bool,
        calls: [AtomicUsize; 3],
        seen: Mutex<Vec<JobState>>,
        stored: Mutex<Vec<(ObjectRef, Transcript)>>,
    }

    fn script(registry: Arc<InMemoryJobRegistry>) -> Script {
        Script {
            registry,
            fetch: Ok("bytes"),
            transform: Ok("text"),
            store: Ok(()),
            transform_panics: None,
            evict_on_fetch: false,
            calls: Default::default(),
            seen: Mutex::new(Vec::new()),
            stored: Mutex::new(Vec::new()),
        }
    }

    impl Script {
        fn observe(&self) {
            let states = self.registry.snapshot().into_iter().map(|r| r.state());
            self.seen.lock().unwrap().extend(states);
        }

        fn calls(&self, i: usize) -> usize {
            self.calls[i].load(Ordering::SeqCst)
        }

        fn steps(self: &Arc<Self>) -> PipelineSteps {
            PipelineSteps::new(self.clone(), self.clone(), self.clone())
        }
    }

    #[async_trait]
    impl ArtifactFetcher for Script {
        async fn fetch(&self, _source: &ObjectRef) -> Result<LocalArtifact, FetchError> {
            self.calls[0].fetch_add(1, Ordering::SeqCst);
            self.observe();
            if self.evict_on_fetch {
                self.registry
                    .evict_updated_before(Utc::now() + chrono::Duration::days(1));
            }
            self.fetch
                .map(LocalArtifact::in_memory)
                .map_err(FetchError::new)
        }
    }

    #[async_trait]
    impl Transcriber for Script {
        async fn transcribe(&self, artifact: &LocalArtifact) -> Result<Transcript, TransformError> {
            self.calls[1].fetch_add(1, Ordering::SeqCst);
            self.observe();
            if let Some(message) = self.transform_panics {
                panic!("{message}");
            }
            assert_eq!(artifact.read_bytes().await.unwrap(), b"bytes");
            self.transform.map(Transcript::new).map_err(TransformError::new)
        }
    }

    #[async_trait]
    impl TranscriptStore for Script {
        async fn store(&self, dest: &ObjectRef, transcript: &Transcript) -> Result<(), StoreError> {
            self.calls[2].fetch_add(1, Ordering::SeqCst);
            self.observe();
            self.store.map_err(StoreError::new)?;
            self.stored
                .lock()
                .unwrap()
                .push((dest.clone(), transcript.clone()));
            Ok(())
        }
    }

    /// Sink that fails every delivery.
    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        fn handles(&self, target: &NotifyTarget) -> bool {
            matches!(target, NotifyTarget::Webhook { .. })
        }

        async fn deliver(&self, _t: &NotifyTarget, _n: &Notification) -> Result<(), DeliveryError> {
            Err(DeliveryError::Http("connection reset".into()))
        }
    }

    fn request() -> JobRequest {
        JobRequest::new(ObjectRef::new("A").unwrap(), ObjectRef::new("B").unwrap())
    }

    #[tokio::test]
    async fn happy_path_completes_and_stores() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(script(registry.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        assert_eq!(executor.run(id).await, RunOutcome::Completed);

        let record = registry.get(id).unwrap();
        assert_eq!(record.state(), JobState::Completed);
        assert_eq!(record.result().unwrap().dest_ref().unwrap().as_str(), "B");
        assert_eq!(
            *script.stored.lock().unwrap(),
            vec![(ObjectRef::new("B").unwrap(), Transcript::new("text"))]
        );
    }

    #[tokio::test]
    async fn each_step_runs_after_its_state_is_recorded() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(script(registry.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        executor.run(id).await;

        assert_eq!(
            *script.seen.lock().unwrap(),
            vec![JobState::Fetching, JobState::Transforming, JobState::Storing]
        );
    }

    #[tokio::test]
    async fn fetch_failure_skips_transform_and_store() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            fetch: Err("NoSuchKey"),
            ..script(registry.clone())
        });
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        let outcome = executor.run(id).await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                stage: JobState::Fetching,
                message: "NoSuchKey".into()
            }
        );
        assert_eq!((script.calls(0), script.calls(1), script.calls(2)), (1, 0, 0));
        let record = registry.get(id).unwrap();
        assert_eq!(record.state(), JobState::Failed);
        assert_eq!(record.result().unwrap().stage(), Some(JobState::Fetching));
    }

    #[tokio::test]
    async fn transform_failure_records_stage_and_message() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            transform: Err("bad codec"),
            ..script(registry.clone())
        });
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        executor.run(id).await;

        let record = registry.get(id).unwrap();
        assert_eq!(record.state(), JobState::Failed);
        let json = serde_json::to_value(record.result().unwrap()).unwrap();
        assert_eq!(json["stage"], "TRANSFORMING");
        assert_eq!(json["message"], "bad codec");
        assert_eq!(script.calls(2), 0);
    }

    #[tokio::test]
    async fn panicking_transcriber_fails_the_job() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            transform_panics: Some("decoder crashed"),
            ..script(registry.clone())
        });
        let kv = Arc::new(InMemoryKv::new());
        let dispatcher = NotificationDispatcher::default().with_sink(KeyValueSink::new(kv.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), dispatcher);

        let id = registry.create(request().with_target(NotifyTarget::key_value("jobs/p")));
        let outcome = executor.run(id).await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                stage: JobState::Transforming,
                message: "step panicked: decoder crashed".into()
            }
        );
        let record = registry.get(id).unwrap();
        assert_eq!(record.state(), JobState::Failed);
        assert_eq!(record.result().unwrap().stage(), Some(JobState::Transforming));
        assert_eq!(script.calls(2), 0);
        assert_eq!(kv.get("jobs/p").as_deref(), Some("FAILED"));
    }

    #[tokio::test]
    async fn job_evicted_during_fetch_is_abandoned() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            evict_on_fetch: true,
            ..script(registry.clone())
        });
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        assert_eq!(executor.run(id).await, RunOutcome::Abandoned);

        assert_eq!((script.calls(0), script.calls(1), script.calls(2)), (1, 0, 0));
        assert_eq!(registry.get(id), Err(RegistryError::NotFound(id)));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn store_failure_fails_the_job() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            store: Err("AccessDenied"),
            ..script(registry.clone())
        });
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        let outcome = executor.run(id).await;

        assert!(matches!(outcome, RunOutcome::Failed { stage: JobState::Storing, .. }));
    }

    #[tokio::test]
    async fn broken_notification_does_not_fail_the_job() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(script(registry.clone()));
        let kv = Arc::new(InMemoryKv::new());
        let dispatcher = NotificationDispatcher::default()
            .with_sink(BrokenSink)
            .with_sink(KeyValueSink::new(kv.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), dispatcher);

        let id = registry.create(
            request()
                .with_target(NotifyTarget::webhook("http://down.invalid/hook"))
                .with_target(NotifyTarget::key_value("jobs/a")),
        );
        assert_eq!(executor.run(id).await, RunOutcome::Completed);

        assert_eq!(registry.get(id).unwrap().state(), JobState::Completed);
        assert_eq!(kv.get("jobs/a").as_deref(), Some("COMPLETED"));
    }

    #[tokio::test]
    async fn failed_jobs_are_broadcast_too() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(Script {
            fetch: Err("timeout"),
            ..script(registry.clone())
        });
        let kv = Arc::new(InMemoryKv::new());
        let dispatcher = NotificationDispatcher::default().with_sink(KeyValueSink::new(kv.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), dispatcher);

        let id = registry.create(request().with_target(NotifyTarget::key_value("jobs/b")));
        executor.run(id).await;

        assert_eq!(kv.get("jobs/b").as_deref(), Some("FAILED"));
    }

    #[tokio::test]
    async fn second_run_of_same_job_is_refused() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(script(registry.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        let id = registry.create(request());
        assert_eq!(executor.run(id).await, RunOutcome::Completed);
        assert_eq!(executor.run(id).await, RunOutcome::Abandoned);
        assert_eq!(script.calls(0), 1);
    }

    #[tokio::test]
    async fn unknown_job_is_abandoned() {
        let registry = InMemoryJobRegistry::arc();
        let script = Arc::new(script(registry.clone()));
        let executor = PipelineExecutor::new(registry.clone(), script.steps(), NotificationDispatcher::default());

        assert_eq!(executor.run(JobId::new()).await, RunOutcome::Abandoned);
        assert_eq!(script.calls(0), 0);
    }
}
