//! # API REST
//!
//! REST API for the photostore media service.
//!
//! Handles:
//! - HTTP endpoints with axum (`/submit`, `/check`, `/media`, `/health`)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart decoding, JSON responses, CORS, body limits)
//!
//! All accept/reject decisions are made by [`photostore_core::IngestService`]; this crate only
//! maps its outcomes onto status codes.

#![warn(rust_2018_idioms)]

mod handlers;
pub mod responses;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use photostore_core::IngestService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use handlers::PHOTO_FIELD;

/// Headroom over the file size limit for multipart boundaries and part headers.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state for the REST API server
///
/// Built once at startup; every handler shares the same [`IngestService`].
#[derive(Clone, Debug)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
}

impl AppState {
    pub fn new(ingest: IngestService) -> Self {
        Self {
            ingest: Arc::new(ingest),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::submit, handlers::check, handlers::list_media),
    components(schemas(
        responses::SubmitForm,
        responses::SubmitCreatedRes,
        responses::SubmitConflictRes,
        responses::ErrorRes,
        responses::CheckFoundRes,
        responses::CheckNotFoundRes,
        responses::HealthRes,
        responses::MediaListRes,
        responses::MediaEntry,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI, CORS and the request body limit applied.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .ingest
        .content()
        .max_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/submit", post(handlers::submit))
        .route("/check", get(handlers::check))
        .route("/media", get(handlers::list_media))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
