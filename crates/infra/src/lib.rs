//! Infrastructure layer: job orchestration, step adapters, notification sinks.

pub mod inference;
pub mod jobs;
pub mod notify;
pub mod storage;
