//! Typed response bodies and their status-code mapping.
//!
//! Each endpoint returns a closed enum ([`SubmitReply`], [`CheckReply`]) rather than ad hoc JSON
//! maps. The `IntoResponse` impls below are the only place where outcomes meet status codes.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use photostore_core::{IngestError, MediaRecord, SubmitOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MSG_SUBMITTED: &str = "Photo submitted successfully";
pub const MSG_ALREADY_EXISTS: &str = "File already exists";
pub const MSG_SAVE_FAILED: &str = "Failed to save file";
pub const MSG_FOUND: &str = "Photo found";
pub const MSG_NOT_FOUND: &str = "Photo not found";
pub const MSG_NO_FILENAME: &str = "No filename provided";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitCreatedRes {
    pub message: String,
    pub file: String,
    pub path: String,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitConflictRes {
    pub error: String,
    pub file: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckFoundRes {
    pub message: String,
    pub path: String,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckNotFoundRes {
    pub error: String,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaEntry {
    pub file: String,
    pub path: String,
    pub size_bytes: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<MediaRecord> for MediaEntry {
    fn from(record: MediaRecord) -> Self {
        Self {
            file: record.filename.into_inner(),
            path: record.storage_path.display().to_string(),
            size_bytes: record.size_bytes,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaListRes {
    pub files: Vec<MediaEntry>,
}

/// Multipart form accepted by `POST /submit` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct SubmitForm {
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
}

/// Outcome of `POST /submit`.
#[derive(Debug)]
pub enum SubmitReply {
    Created { file: String, path: String },
    Conflict { file: String, path: String },
    ClientInputError { status: StatusCode, error: String },
    ServerError { error: String },
}

impl SubmitReply {
    pub fn bad_request(error: impl Into<String>) -> Self {
        SubmitReply::ClientInputError {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }

    /// Maps a multipart decoding failure, keeping axum's status (413 for an oversized body).
    pub fn from_multipart(err: &MultipartError) -> Self {
        SubmitReply::ClientInputError {
            status: err.status(),
            error: err.body_text(),
        }
    }
}

impl From<SubmitOutcome> for SubmitReply {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Created { record } => SubmitReply::Created {
                file: record.filename.into_inner(),
                path: record.storage_path.display().to_string(),
            },
            SubmitOutcome::Conflict { existing } => SubmitReply::Conflict {
                file: existing.filename.into_inner(),
                path: existing.storage_path.display().to_string(),
            },
        }
    }
}

impl From<IngestError> for SubmitReply {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::MissingFile | IngestError::InvalidFilename(_) => {
                tracing::warn!(error = %err, "rejected submission");
                SubmitReply::bad_request(err.to_string())
            }
            IngestError::PayloadTooLarge { .. } => {
                tracing::warn!(error = %err, "rejected submission");
                SubmitReply::ClientInputError {
                    status: StatusCode::PAYLOAD_TOO_LARGE,
                    error: err.to_string(),
                }
            }
            IngestError::Write { source, .. } if source.stream_error().is_some() => {
                // The client's body broke off; nothing was wrong with the disk.
                tracing::warn!(error = %err, "upload stream failed");
                let status = source
                    .stream_error()
                    .and_then(|e| e.downcast_ref::<MultipartError>())
                    .map(MultipartError::status)
                    .unwrap_or(StatusCode::BAD_REQUEST);
                SubmitReply::ClientInputError {
                    status,
                    error: err.to_string(),
                }
            }
            _ => {
                tracing::error!(error = ?err, "submission failed");
                SubmitReply::ServerError {
                    error: MSG_SAVE_FAILED.into(),
                }
            }
        }
    }
}

impl IntoResponse for SubmitReply {
    fn into_response(self) -> Response {
        match self {
            SubmitReply::Created { file, path } => (
                StatusCode::OK,
                Json(SubmitCreatedRes {
                    message: MSG_SUBMITTED.into(),
                    file,
                    path,
                    status: StatusCode::OK.as_u16(),
                }),
            )
                .into_response(),
            SubmitReply::Conflict { file, path } => (
                StatusCode::CONFLICT,
                Json(SubmitConflictRes {
                    error: MSG_ALREADY_EXISTS.into(),
                    file,
                    path,
                }),
            )
                .into_response(),
            SubmitReply::ClientInputError { status, error } => {
                (status, Json(ErrorRes { error })).into_response()
            }
            SubmitReply::ServerError { error } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorRes { error })).into_response()
            }
        }
    }
}

/// Outcome of `GET /check`.
#[derive(Debug)]
pub enum CheckReply {
    Found { path: String },
    NotFound,
    ClientInputError { error: String },
    ServerError,
}

impl IntoResponse for CheckReply {
    fn into_response(self) -> Response {
        match self {
            CheckReply::Found { path } => (
                StatusCode::OK,
                Json(CheckFoundRes {
                    message: MSG_FOUND.into(),
                    path,
                    status: StatusCode::OK.as_u16(),
                }),
            )
                .into_response(),
            CheckReply::NotFound => (
                StatusCode::NOT_FOUND,
                Json(CheckNotFoundRes {
                    error: MSG_NOT_FOUND.into(),
                    status: StatusCode::NOT_FOUND.as_u16(),
                }),
            )
                .into_response(),
            CheckReply::ClientInputError { error } => {
                (StatusCode::BAD_REQUEST, Json(ErrorRes { error })).into_response()
            }
            CheckReply::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            )
                .into_response(),
        }
    }
}
