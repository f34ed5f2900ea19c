use crate::responses::{
    CheckFoundRes, CheckNotFoundRes, CheckReply, ErrorRes, HealthRes, MediaEntry, MediaListRes,
    SubmitConflictRes, SubmitCreatedRes, SubmitForm, SubmitReply, MSG_NO_FILENAME,
};
use crate::AppState;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use photostore_core::{Filename, IngestError};
use serde::Deserialize;
use utoipa::IntoParams;

/// Name of the multipart part that carries the upload.
pub const PHOTO_FIELD: &str = "photo";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckParams {
    /// Filename to look up, exactly as it was submitted
    pub filename: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used by monitoring and load balancer health checks.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Photostore REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/submit",
    request_body(content = SubmitForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Photo stored", body = SubmitCreatedRes),
        (status = 409, description = "A file with this name already exists", body = SubmitConflictRes),
        (status = 400, description = "Missing file part, invalid filename or malformed body", body = ErrorRes),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorRes),
        (status = 500, description = "Failed to save file", body = ErrorRes)
    )
)]
/// Accept an uploaded photo unless its filename is already stored
///
/// Reads parts until the `photo` part is found and streams it straight into the content store;
/// the body is never buffered whole. Other parts are skipped.
///
/// # Returns
/// * `200` with the stored path when the filename is new
/// * `409` with the existing path when the filename was stored before (including by a concurrent
///   request that finished first)
///
/// # Errors
/// Returns `400` for a missing `photo` part or an unusable filename, `413` when the body exceeds
/// the limit, and `500` when the bytes or the record could not be saved.
#[axum::debug_handler]
pub(crate) async fn submit(State(state): State<AppState>, mut multipart: Multipart) -> SubmitReply {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return IngestError::MissingFile.into(),
            Err(e) => {
                tracing::warn!(error = %e, "malformed multipart body");
                return SubmitReply::from_multipart(&e);
            }
        };

        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }

        let Some(raw_name) = field.file_name().map(str::to_owned) else {
            return IngestError::MissingFile.into();
        };

        let filename = match Filename::new(raw_name) {
            Ok(filename) => filename,
            Err(e) => return IngestError::from(e).into(),
        };

        tracing::info!(filename = %filename, "upload received");

        return match state.ingest.submit(filename, Box::pin(field)).await {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        };
    }
}

#[utoipa::path(
    get,
    path = "/check",
    params(CheckParams),
    responses(
        (status = 200, description = "Photo found", body = CheckFoundRes),
        (status = 404, description = "Photo not found", body = CheckNotFoundRes),
        (status = 400, description = "No filename provided", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Report whether a filename has been stored, and where
// No `#[axum::debug_handler]` here: its expansion defines a helper `fn check`, which collides with
// this handler's name in axum-macros 0.4.
pub(crate) async fn check(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> CheckReply {
    let raw_name = match params.filename {
        Some(name) if !name.is_empty() => name,
        _ => {
            return CheckReply::ClientInputError {
                error: MSG_NO_FILENAME.into(),
            }
        }
    };

    let filename = match Filename::new(raw_name) {
        Ok(filename) => filename,
        Err(e) => {
            tracing::warn!(error = %e, "rejected check");
            return CheckReply::ClientInputError {
                error: e.to_string(),
            };
        }
    };

    match state.ingest.lookup(&filename).await {
        Ok(Some(record)) => CheckReply::Found {
            path: record.storage_path.display().to_string(),
        },
        Ok(None) => CheckReply::NotFound,
        Err(e) => {
            tracing::error!("Lookup error: {:?}", e);
            CheckReply::ServerError
        }
    }
}

#[utoipa::path(
    get,
    path = "/media",
    responses(
        (status = 200, description = "All stored photos in submission order", body = MediaListRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_media(
    State(state): State<AppState>,
) -> Result<Json<MediaListRes>, (StatusCode, &'static str)> {
    match state.ingest.list().await {
        Ok(records) => Ok(Json(MediaListRes {
            files: records.into_iter().map(MediaEntry::from).collect(),
        })),
        Err(e) => {
            tracing::error!("List media error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}
