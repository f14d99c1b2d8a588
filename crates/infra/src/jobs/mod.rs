//! Transcription job system.
//!
//! ## Design
//!
//! - A job is created PENDING and returned to the caller immediately
//! - Its pipeline runs on its own task: fetch, transform, store, notify
//! - Every state change goes through the registry before the next step starts
//! - Step failures end the job as FAILED with the failing stage recorded
//! - Old records are evicted by a periodic sweep
//!
//! ## Components
//!
//! - `JobRegistry`: concurrent id → record map
//! - `PipelineSteps`: the three pluggable I/O capabilities
//! - `PipelineExecutor`: drives one job through its states
//! - `JobOrchestrator`: submission and status lookup
//! - `Sweeper`: retention enforcement

pub mod executor;
pub mod orchestrator;
pub mod registry;
pub mod steps;
pub mod sweeper;

pub use executor::{PipelineExecutor, RunOutcome};
pub use orchestrator::{JobHandle, JobOrchestrator};
pub use registry::{InMemoryJobRegistry, JobRegistry, JobStats, RegistryError};
pub use steps::{
    ArtifactFetcher, FetchError, LocalArtifact, PipelineSteps, StoreError, TranscriptStore,
    Transcriber, TransformError,
};
pub use sweeper::{Sweeper, SweeperHandle};
