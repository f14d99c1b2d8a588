//! Job intake: allocate a record, schedule its pipeline, return immediately.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use scribe_core::{JobId, JobRecord, JobRequest};

use super::executor::{PipelineExecutor, RunOutcome};
use super::registry::{JobRegistry, RegistryError};

/// Accepts submissions and runs each one as its own tokio task.
///
/// Submissions are independent: the same source/destination pair submitted
/// twice produces two jobs.
pub struct JobOrchestrator<R: JobRegistry> {
    executor: Arc<PipelineExecutor<R>>,
}

impl<R: JobRegistry> Clone for JobOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<R: JobRegistry + 'static> JobOrchestrator<R> {
    pub fn new(executor: PipelineExecutor<R>) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Create a PENDING job and spawn its pipeline.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned handle
    /// detaches the pipeline; it keeps running.
    pub fn submit(&self, request: JobRequest) -> JobHandle {
        let id = self.executor.registry().create(request);
        info!(job_id = %id, "job submitted");

        let executor = self.executor.clone();
        let join = tokio::spawn(async move { executor.run(id).await });
        JobHandle { id, join }
    }

    pub fn status(&self, id: JobId) -> Result<JobRecord, RegistryError> {
        self.executor.registry().get(id)
    }

    pub fn registry(&self) -> &R {
        self.executor.registry()
    }
}

/// A submitted job. Await [`JobHandle::wait`] to learn how the pipeline ended.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    join: JoinHandle<RunOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub async fn wait(self) -> RunOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %self.id, error = %e, "pipeline task did not finish");
                RunOutcome::Abandoned
            }
        }
    }
}
