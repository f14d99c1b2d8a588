//! Step adapters injected into the pipeline.
//!
//! The executor treats each step as a black box that either succeeds with a
//! value or fails with a message. Timeouts, retries and transport details are
//! the adapter's business.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thiserror::Error;

use scribe_core::{ObjectRef, Transcript};

macro_rules! stage_error {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        #[error("{0}")]
        pub struct $name(pub String);

        impl $name {
            pub fn new(message: impl Into<String>) -> Self {
                Self(message.into())
            }

            pub fn message(&self) -> &str {
                &self.0
            }
        }
    };
}

stage_error!(FetchError, "The source artifact could not be fetched.");
stage_error!(TransformError, "The artifact could not be transcribed.");
stage_error!(StoreError, "The transcript could not be stored.");

/// Transient copy of the source artifact.
///
/// Dropping it releases whatever it holds (the temp file is deleted).
#[derive(Debug)]
pub struct LocalArtifact {
    data: ArtifactData,
}

#[derive(Debug)]
enum ArtifactData {
    Memory(Vec<u8>),
    TempFile(NamedTempFile),
}

impl LocalArtifact {
    pub fn in_memory(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: ArtifactData::Memory(bytes.into()),
        }
    }

    pub fn temp_file(file: NamedTempFile) -> Self {
        Self {
            data: ArtifactData::TempFile(file),
        }
    }

    /// Path on disk, if the artifact is file-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            ArtifactData::Memory(_) => None,
            ArtifactData::TempFile(file) => Some(file.path()),
        }
    }

    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.data {
            ArtifactData::Memory(bytes) => Ok(bytes.clone()),
            ArtifactData::TempFile(file) => tokio::fs::read(file.path()).await,
        }
    }
}

/// Fetch the source artifact into local transient storage.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, source: &ObjectRef) -> Result<LocalArtifact, FetchError>;
}

/// Turn audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, artifact: &LocalArtifact) -> Result<Transcript, TransformError>;
}

/// Write the transcript to its destination.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn store(&self, dest: &ObjectRef, transcript: &Transcript) -> Result<(), StoreError>;
}

/// The three steps a pipeline runs, each injectable on its own.
#[derive(Clone)]
pub struct PipelineSteps {
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub transcriber: Arc<dyn Transcriber>,
    pub store: Arc<dyn TranscriptStore>,
}

impl PipelineSteps {
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        transcriber: Arc<dyn Transcriber>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            store,
        }
    }
}

impl std::fmt::Debug for PipelineSteps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSteps").finish_non_exhaustive()
    }
}
