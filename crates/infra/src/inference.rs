//! Client for the speech-to-text inference service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use scribe_core::{Segment, Transcript};

use crate::jobs::{LocalArtifact, Transcriber, TransformError};

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    segments: Vec<Segment>,
}

/// POSTs raw audio to `{base_url}/transcribe` and renders the returned segments.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    /// `timeout` bounds each whole request; a hung service fails the job as TRANSFORMING.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, TransformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransformError::new(e.to_string()))?;
        let endpoint = format!("{}/transcribe", base_url.as_ref().trim_end_matches('/'));
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, artifact: &LocalArtifact) -> Result<Transcript, TransformError> {
        let audio = artifact
            .read_bytes()
            .await
            .map_err(|e| TransformError::new(format!("cannot read artifact: {e}")))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| TransformError::new(format!("inference request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransformError::new(format!("HTTP {status}: {body}")));
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TransformError::new(format!("malformed inference response: {e}")))?;
        debug!(segments = parsed.segments.len(), "inference returned");
        Ok(Transcript::from_segments(parsed.segments))
    }
}
