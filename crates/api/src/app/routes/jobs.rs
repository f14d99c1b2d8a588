use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use scribe_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::TranscribeRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };
    let request = match body.into_job_request() {
        Ok(request) => request,
        Err(response) => return response,
    };

    let source = request.source_ref.clone();
    let handle = services.orchestrator.submit(request);
    info!(job_id = %handle.id(), source = %source, "transcription accepted");

    (StatusCode::OK, Json(dto::SubmitResponse { job_id: handle.id() })).into_response()
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match job_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_job_id", e.to_string()),
    };

    match services.orchestrator.status(id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let stats = services.registry().stats();
    (StatusCode::OK, Json(stats)).into_response()
}
