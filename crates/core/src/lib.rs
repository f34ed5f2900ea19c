//! # Photostore Core
//!
//! Ingest-and-dedup logic for the photostore media service.
//!
//! This crate decides whether an uploaded file is new and, if it is, commits its bytes and its
//! catalog record:
//! - [`IngestService`] coordinates the check-then-write-then-insert sequence
//! - [`metadata`] holds the durable filename catalog (SQLite)
//! - [`config`] carries startup configuration and directory bootstrap
//!
//! **No transport concerns**: HTTP routing and response encoding belong in `photostore-api-rest`.

pub mod config;
pub mod constants;
mod error;
mod ingest;
pub mod metadata;
mod reconcile;

pub use config::CoreConfig;
pub use constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_REST_ADDR, DEFAULT_UPLOAD_DIR,
};
pub use error::{IngestError, IngestResult};
pub use ingest::{IngestService, SubmitOutcome};
pub use metadata::{MediaRecord, MetadataError, MetadataStore, SqliteMetadataStore};
pub use reconcile::ReconcileReport;

pub use photostore_files::{ContentStore, FilesError};
pub use photostore_types::{Filename, FilenameError};
