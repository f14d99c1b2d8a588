//! `scribe-core`: domain building blocks for transcription jobs.
//!
//! This crate contains **pure domain** types (no I/O, no async): the job
//! record and its state machine, object locators, notification targets and
//! transcript rendering.

pub mod error;
pub mod id;
pub mod job;
pub mod reference;
pub mod target;
pub mod transcript;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{JobMutation, JobOutcome, JobRecord, JobRequest, JobState};
pub use reference::ObjectRef;
pub use target::NotifyTarget;
pub use transcript::{Segment, Transcript};
