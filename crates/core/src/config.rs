//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then passed
//! into core services. Request handling never reads environment variables; binaries read them,
//! build a [`CoreConfig`], and hand it to [`crate::IngestService::from_config`].

use crate::constants::DEFAULT_MAX_UPLOAD_BYTES;
use crate::{IngestError, IngestResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    database_path: PathBuf,
    max_upload_bytes: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidConfig`] if `max_upload_bytes` is zero or the catalog would
    /// live directly inside the upload directory (where it would look like an uploaded file).
    pub fn new(
        upload_dir: PathBuf,
        database_path: PathBuf,
        max_upload_bytes: u64,
    ) -> IngestResult<Self> {
        if max_upload_bytes == 0 {
            return Err(IngestError::InvalidConfig(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }

        if upload_dir.as_os_str().is_empty() {
            return Err(IngestError::InvalidConfig("upload_dir cannot be empty".into()));
        }

        if database_path.parent() == Some(upload_dir.as_path()) {
            return Err(IngestError::InvalidConfig(format!(
                "database_path {} must not be inside the upload directory",
                database_path.display()
            )));
        }

        Ok(Self {
            upload_dir,
            database_path,
            max_upload_bytes,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Create the upload directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UploadDirCreation`] if the directory cannot be created, or
    /// [`IngestError::InvalidConfig`] if the path exists but is not a directory.
    pub fn ensure_upload_dir(&self) -> IngestResult<()> {
        if self.upload_dir.is_dir() {
            return Ok(());
        }

        if self.upload_dir.exists() {
            return Err(IngestError::InvalidConfig(format!(
                "upload_dir {} exists but is not a directory",
                self.upload_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.upload_dir).map_err(|source| {
            IngestError::UploadDirCreation {
                path: self.upload_dir.clone(),
                source,
            }
        })?;
        tracing::info!(path = %self.upload_dir.display(), "created upload directory");
        Ok(())
    }
}

/// Parse the upload size ceiling from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the 1 GiB default.
pub fn max_upload_bytes_from_env_value(value: Option<String>) -> IngestResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_UPLOAD_BYTES),
        Some(v) => v.parse::<u64>().map_err(|e| {
            IngestError::InvalidConfig(format!("MAX_UPLOAD_BYTES {v:?} is not a byte count: {e}"))
        }),
    }
}
