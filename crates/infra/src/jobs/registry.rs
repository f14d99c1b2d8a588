//! Job registry: the concurrency-safe store of job records.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use scribe_core::{DomainError, JobId, JobMutation, JobRecord, JobRequest, JobState};

/// Registry abstraction.
///
/// Every method is atomic on its own; a caller's read-then-update sequence is
/// not. The pipeline executor is the only writer of a given job.
pub trait JobRegistry: Send + Sync {
    /// Store a fresh PENDING record and return its id.
    fn create(&self, request: JobRequest) -> JobId;

    /// Snapshot of a record.
    fn get(&self, id: JobId) -> Result<JobRecord, RegistryError>;

    /// Apply a mutation and return the updated snapshot.
    fn update(&self, id: JobId, mutation: JobMutation) -> Result<JobRecord, RegistryError>;

    /// Remove every record last updated strictly before `cutoff`. Returns how many were removed.
    fn evict_updated_before(&self, cutoff: DateTime<Utc>) -> usize;

    /// Remove every record not updated within `retention` of now.
    fn sweep(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(retention) {
            Some(cutoff) => self.evict_updated_before(cutoff),
            None => 0,
        }
    }
}

/// Registry error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Unknown id: never created, or already evicted.
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error(transparent)]
    Transition(#[from] DomainError),
}

/// Record counts per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub fetching: usize,
    pub transforming: usize,
    pub storing: usize,
    pub notifying: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.pending
            + self.fetching
            + self.transforming
            + self.storing
            + self.notifying
            + self.completed
            + self.failed
    }
}

/// In-memory registry: one map behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every record, oldest first.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
        records.sort_by_key(|r| r.created_at());
        records
    }

    pub fn stats(&self) -> JobStats {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.state() {
                JobState::Pending => stats.pending += 1,
                JobState::Fetching => stats.fetching += 1,
                JobState::Transforming => stats.transforming += 1,
                JobState::Storing => stats.storing += 1,
                JobState::Notifying => stats.notifying += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

// A panic while holding the lock cannot leave a record half-written
// (`JobRecord::apply` validates before it assigns), so poisoned guards are reused.
impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, request: JobRequest) -> JobId {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let id = loop {
            let id = JobId::new();
            if !jobs.contains_key(&id) {
                break id;
            }
        };
        jobs.insert(id, JobRecord::new(id, request, Utc::now()));
        id
    }

    fn get(&self, id: JobId) -> Result<JobRecord, RegistryError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }

    fn update(&self, id: JobId, mutation: JobMutation) -> Result<JobRecord, RegistryError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let record = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        record.apply(mutation, Utc::now())?;
        Ok(record.clone())
    }

    fn evict_updated_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted: Vec<(JobId, JobState)> = Vec::new();
        {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            jobs.retain(|id, job| {
                let keep = job.updated_at() >= cutoff;
                if !keep {
                    evicted.push((*id, job.state()));
                }
                keep
            });
        }

        for (id, state) in &evicted {
            if state.is_terminal() {
                debug!(job_id = %id, state = %state, "evicted job");
            } else {
                info!(job_id = %id, state = %state, "evicted job that had not finished");
            }
        }
        evicted.len()
    }
}

impl<T: JobRegistry + ?Sized> JobRegistry for Arc<T> {
    fn create(&self, request: JobRequest) -> JobId {
        (**self).create(request)
    }

    fn get(&self, id: JobId) -> Result<JobRecord, RegistryError> {
        (**self).get(id)
    }

    fn update(&self, id: JobId, mutation: JobMutation) -> Result<JobRecord, RegistryError> {
        (**self).update(id, mutation)
    }

    fn evict_updated_before(&self, cutoff: DateTime<Utc>) -> usize {
        (**self).evict_updated_before(cutoff)
    }

    fn sweep(&self, retention: Duration) -> usize {
        (**self).sweep(retention)
    }
}
