//! Pipeline steps over `object_store`.
//!
//! Fetched objects are written to a temp file so the pipeline owns (and later
//! releases) its own copy. S3 stores are built per bucket on first use and reused.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tempfile::NamedTempFile;
use tracing::debug;

use scribe_core::{ObjectRef, Transcript};

use super::factory::{S3Settings, StorageError, StorageSettings, build_local, build_s3};
use crate::jobs::{ArtifactFetcher, FetchError, LocalArtifact, StoreError, TranscriptStore};

pub struct ObjectStorage {
    backend: Backend,
}

enum Backend {
    /// One store for every bucket; the bucket is the first path segment.
    Local(Arc<dyn ObjectStore>),
    S3 {
        settings: S3Settings,
        buckets: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
    },
}

impl ObjectStorage {
    pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let backend = match settings {
            StorageSettings::Local { root } => Backend::Local(build_local(root)?),
            StorageSettings::S3(s3) => Backend::S3 {
                settings: s3.clone(),
                buckets: RwLock::new(HashMap::new()),
            },
        };
        Ok(Self { backend })
    }

    /// Store holding `object`, and the object's path inside it.
    pub fn locate(
        &self,
        object: &ObjectRef,
    ) -> Result<(Arc<dyn ObjectStore>, ObjectPath), StorageError> {
        let (bucket, key) = object
            .bucket_and_key()
            .map_err(|e| StorageError::InvalidRef(e.to_string()))?;
        let invalid = |e: object_store::path::Error| {
            StorageError::InvalidRef(format!("object reference {object} is not a valid key: {e}"))
        };

        match &self.backend {
            Backend::Local(store) => {
                let path = ObjectPath::parse(format!("{bucket}/{key}")).map_err(invalid)?;
                Ok((store.clone(), path))
            }
            Backend::S3 { settings, buckets } => {
                let path = ObjectPath::parse(key).map_err(invalid)?;
                Ok((self.bucket(settings, buckets, bucket)?, path))
            }
        }
    }

    fn bucket(
        &self,
        settings: &S3Settings,
        buckets: &RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
        name: &str,
    ) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if let Some(store) = buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(store.clone());
        }

        let mut buckets = buckets.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = buckets.get(name) {
            return Ok(store.clone());
        }
        let store = build_s3(settings, name)?;
        debug!(bucket = name, "s3 bucket store built");
        buckets.insert(name.to_string(), store.clone());
        Ok(store)
    }
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.backend {
            Backend::Local(store) => f.debug_tuple("ObjectStorage").field(store).finish(),
            Backend::S3 { settings, .. } => f.debug_tuple("ObjectStorage").field(settings).finish(),
        }
    }
}

#[async_trait]
impl ArtifactFetcher for ObjectStorage {
    async fn fetch(&self, source: &ObjectRef) -> Result<LocalArtifact, FetchError> {
        let (store, path) = self
            .locate(source)
            .map_err(|e| FetchError::new(e.to_string()))?;

        let bytes = match async { store.get(&path).await?.bytes().await }.await {
            Ok(bytes) => bytes,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(FetchError::new(format!("no such object: {source}")));
            }
            Err(e) => return Err(FetchError::new(format!("cannot read {source}: {e}"))),
        };

        let temp = NamedTempFile::new()
            .map_err(|e| FetchError::new(format!("cannot create temp file: {e}")))?;
        let size = bytes.len();
        tokio::fs::write(temp.path(), bytes)
            .await
            .map_err(|e| FetchError::new(format!("cannot write temp file: {e}")))?;
        debug!(source = %source, bytes = size, "object fetched");
        Ok(LocalArtifact::temp_file(temp))
    }
}

#[async_trait]
impl TranscriptStore for ObjectStorage {
    async fn store(&self, dest: &ObjectRef, transcript: &Transcript) -> Result<(), StoreError> {
        let (store, path) = self
            .locate(dest)
            .map_err(|e| StoreError::new(e.to_string()))?;

        store
            .put(&path, transcript.as_str().to_owned().into())
            .await
            .map_err(|e| StoreError::new(format!("cannot write {dest}: {e}")))?;
        debug!(dest = %dest, bytes = transcript.as_str().len(), "transcript stored");
        Ok(())
    }
}
