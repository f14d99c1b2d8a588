//! Object store adapters.
//!
//! Local directories and S3-compatible services sit behind the same
//! `Arc<dyn ObjectStore>`, so the pipeline steps never branch on the backend.

pub mod factory;
pub mod objects;

pub use factory::{S3Settings, StorageError, StorageSettings};
pub use objects::ObjectStorage;
