use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use scribe_core::{JobId, JobRequest, NotifyTarget, ObjectRef};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /transcribe`.
#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub input_s3_path: String,
    pub output_s3_path: String,
    pub webhook_url: Option<String>,
    pub consul_key: Option<String>,
    #[serde(default)]
    pub notify_targets: Vec<NotifyTarget>,
}

impl TranscribeRequest {
    /// Validate both locators and collect every notify target.
    pub fn into_job_request(self) -> Result<JobRequest, axum::response::Response> {
        let source = parse_object_ref("input_s3_path", self.input_s3_path)?;
        let dest = parse_object_ref("output_s3_path", self.output_s3_path)?;

        let mut request = JobRequest::new(source, dest);
        if let Some(url) = self.webhook_url.filter(|u| !u.trim().is_empty()) {
            request = request.with_target(NotifyTarget::webhook(url));
        }
        if let Some(key) = self.consul_key.filter(|k| !k.trim().is_empty()) {
            request = request.with_target(NotifyTarget::key_value(key));
        }
        for target in self.notify_targets {
            request = request.with_target(target);
        }
        Ok(request)
    }
}

fn parse_object_ref(field: &str, value: String) -> Result<ObjectRef, axum::response::Response> {
    let object = ObjectRef::new(value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{field}: {e}")))?;
    object
        .bucket_and_key()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{field}: {e}")))?;
    Ok(object)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> TranscribeRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn legacy_fields_become_notify_targets() {
        let request = body(serde_json::json!({
            "input_s3_path": "s3://media/a.wav",
            "output_s3_path": "media/a.md",
            "webhook_url": "http://hooks.local/done",
            "consul_key": "transcription/a",
            "notify_targets": [{"kind": "key_value", "key": "extra"}]
        }))
        .into_job_request()
        .unwrap();

        assert_eq!(request.source_ref.as_str(), "s3://media/a.wav");
        assert_eq!(
            request.notify_targets,
            vec![
                NotifyTarget::webhook("http://hooks.local/done"),
                NotifyTarget::key_value("transcription/a"),
                NotifyTarget::key_value("extra"),
            ]
        );
    }

    #[test]
    fn locator_without_key_is_rejected() {
        let response = body(serde_json::json!({
            "input_s3_path": "media",
            "output_s3_path": "media/a.md"
        }))
        .into_job_request()
        .unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
