//! Job record and its state machine.
//!
//! A job moves along a single path:
//!
//! ```text
//! PENDING -> FETCHING -> TRANSFORMING -> STORING -> NOTIFYING -> COMPLETED
//!               |             |             |
//!               +-------------+-------------+-------> FAILED
//! ```
//!
//! `JobRecord::apply` is the only way to change a record, so every record that
//! exists satisfies: `result.is_some() == state.is_terminal()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::reference::ObjectRef;
use crate::target::NotifyTarget;

/// Pipeline state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Fetching,
    Transforming,
    Storing,
    Notifying,
    Completed,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 7] = [
        JobState::Pending,
        JobState::Fetching,
        JobState::Transforming,
        JobState::Storing,
        JobState::Notifying,
        JobState::Completed,
        JobState::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the pipeline. Observed states of one job never decrease in rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Fetching => 1,
            Self::Transforming => 2,
            Self::Storing => 3,
            Self::Notifying => 4,
            Self::Completed | Self::Failed => 5,
        }
    }

    /// Whether `next` is an edge of the pipeline graph starting at `self`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Transforming)
                | (Fetching, Failed)
                | (Transforming, Storing)
                | (Transforming, Failed)
                | (Storing, Notifying)
                | (Storing, Failed)
                | (Notifying, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Fetching => "FETCHING",
            Self::Transforming => "TRANSFORMING",
            Self::Storing => "STORING",
            Self::Notifying => "NOTIFYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal payload of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The transcript was stored at `dest_ref`.
    Output { dest_ref: ObjectRef },
    /// The step running in `stage` failed with `message`.
    Error { stage: JobState, message: String },
}

impl JobOutcome {
    pub fn dest_ref(&self) -> Option<&ObjectRef> {
        match self {
            Self::Output { dest_ref } => Some(dest_ref),
            Self::Error { .. } => None,
        }
    }

    pub fn stage(&self) -> Option<JobState> {
        match self {
            Self::Output { .. } => None,
            Self::Error { stage, .. } => Some(*stage),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Output { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }
}

/// A single change to a job record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMutation {
    /// Move to the next non-terminal stage.
    Advance(JobState),
    /// NOTIFYING -> COMPLETED, recording the destination as the result.
    Complete,
    /// Current stage -> FAILED, recording the current stage and `message`.
    Fail { message: String },
}

impl JobMutation {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
        }
    }
}

/// What a submitter asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub source_ref: ObjectRef,
    pub dest_ref: ObjectRef,
    #[serde(default)]
    pub notify_targets: Vec<NotifyTarget>,
}

impl JobRequest {
    pub fn new(source_ref: ObjectRef, dest_ref: ObjectRef) -> Self {
        Self {
            source_ref,
            dest_ref,
            notify_targets: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: NotifyTarget) -> Self {
        self.notify_targets.push(target);
        self
    }
}

/// One submitted unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    id: JobId,
    state: JobState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    result: Option<JobOutcome>,
    source_ref: ObjectRef,
    dest_ref: ObjectRef,
    notify_targets: Vec<NotifyTarget>,
}

impl JobRecord {
    /// Create a PENDING record.
    pub fn new(id: JobId, request: JobRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            source_ref: request.source_ref,
            dest_ref: request.dest_ref,
            notify_targets: request.notify_targets,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn result(&self) -> Option<&JobOutcome> {
        self.result.as_ref()
    }

    pub fn source_ref(&self) -> &ObjectRef {
        &self.source_ref
    }

    pub fn dest_ref(&self) -> &ObjectRef {
        &self.dest_ref
    }

    pub fn notify_targets(&self) -> &[NotifyTarget] {
        &self.notify_targets
    }

    /// Apply a mutation, refreshing `updated_at`.
    ///
    /// On error the record is left untouched.
    pub fn apply(&mut self, mutation: JobMutation, now: DateTime<Utc>) -> DomainResult<()> {
        let (next, result) = match mutation {
            JobMutation::Advance(next) if next.is_terminal() => {
                return Err(DomainError::invalid_transition(self.state, next));
            }
            JobMutation::Advance(next) => (next, None),
            JobMutation::Complete => (
                JobState::Completed,
                Some(JobOutcome::Output {
                    dest_ref: self.dest_ref.clone(),
                }),
            ),
            JobMutation::Fail { message } => (
                JobState::Failed,
                Some(JobOutcome::Error {
                    stage: self.state,
                    message,
                }),
            ),
        };

        if !self.state.can_transition_to(next) {
            return Err(DomainError::invalid_transition(self.state, next));
        }

        self.state = next;
        self.result = result;
        self.updated_at = now.max(self.updated_at);
        Ok(())
    }
}
