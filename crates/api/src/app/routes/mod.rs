use axum::{
    routing::{get, post},
    Router,
};

pub mod jobs;
pub mod system;

/// Router for the job endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/transcribe", post(jobs::submit))
        .route("/status/:job_id", get(jobs::status))
        .route("/jobs/stats", get(jobs::stats))
}
