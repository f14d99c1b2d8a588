//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (registry, adapters, notification sinks)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices, ServiceError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// A non-empty `root_path` (e.g. `/transcription`) prefixes every route.
pub fn build_app(services: AppServices, root_path: &str) -> Router {
    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(Arc::new(services))));

    if root_path.is_empty() {
        app
    } else {
        Router::new().nest(root_path, app)
    }
}
