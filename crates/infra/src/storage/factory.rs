//! `ObjectStore` construction for each backend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::{ClientOptions, ObjectStore};
use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage config: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidRef(String),
}

/// Where objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSettings {
    /// `bucket/key` maps to `<root>/<bucket>/<key>`.
    Local { root: PathBuf },
    /// AWS S3 or any S3-compatible service.
    S3(S3Settings),
}

#[derive(Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint (MinIO, Ceph, ...). `None` talks to AWS.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("S3Settings")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("session_token", &redacted(&self.session_token))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// A store rooted at a local directory, created if missing.
pub fn build_local(root: &Path) -> Result<Arc<dyn ObjectStore>, StorageError> {
    std::fs::create_dir_all(root).map_err(|e| {
        StorageError::Config(format!("cannot create storage directory {}: {e}", root.display()))
    })?;
    let absolute = root.canonicalize().map_err(|e| {
        StorageError::Config(format!("cannot resolve storage directory {}: {e}", root.display()))
    })?;

    LocalFileSystem::new_with_prefix(absolute)
        .map(|fs| Arc::new(fs) as Arc<dyn ObjectStore>)
        .map_err(|e| StorageError::Config(format!("LocalFileSystem: {e}")))
}

/// A store for one S3 bucket. Builds offline; credentials are checked on first request.
pub fn build_s3(settings: &S3Settings, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&settings.region)
        .with_client_options(ClientOptions::new().with_timeout(settings.request_timeout));

    if let Some(endpoint) = &settings.endpoint {
        // Path-style requests for custom endpoints.
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false);
        if endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }
    if let Some(key) = &settings.access_key_id {
        builder = builder.with_access_key_id(key);
    }
    if let Some(secret) = &settings.secret_access_key {
        builder = builder.with_secret_access_key(secret);
    }
    if let Some(token) = &settings.session_token {
        builder = builder.with_token(token);
    }

    let store = builder
        .build()
        .map_err(|e| StorageError::Config(format!("S3 bucket {bucket}: {e}")))?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects/nested");

        build_local(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let settings = S3Settings {
            access_key_id: Some("AKIAEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI".into()),
            session_token: Some("FwoGZXIvYXdzE".into()),
            ..S3Settings::default()
        };

        let debug = format!("{settings:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("FwoGZXIvYXdzE"));
    }

    #[test]
    fn s3_store_builds_without_network() {
        let settings = S3Settings {
            endpoint: Some("http://127.0.0.1:9000".into()),
            access_key_id: Some("minio".into()),
            secret_access_key: Some("minio123".into()),
            ..S3Settings::default()
        };

        let store = build_s3(&settings, "ai-storage").unwrap();
        assert_eq!(store.to_string(), "AmazonS3(ai-storage)");
    }
}
