//! Object locators.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

const S3_SCHEME: &str = "s3://";

/// Opaque locator of an object in the remote store.
///
/// The pipeline only carries it around; adapters that need a bucket and key
/// call [`ObjectRef::bucket_and_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("object reference must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split `bucket/key` (optionally prefixed with `s3://`) on the first `/`.
    pub fn bucket_and_key(&self) -> DomainResult<(&str, &str)> {
        let path = self.0.strip_prefix(S3_SCHEME).unwrap_or(&self.0);
        match path.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
            _ => Err(DomainError::validation(format!(
                "object reference {:?} is not of the form bucket/key",
                self.0
            ))),
        }
    }
}

impl core::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectRef {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectRef> for String {
    fn from(value: ObjectRef) -> Self {
        value.0
    }
}
