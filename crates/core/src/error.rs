use crate::metadata::MetadataError;
use photostore_files::FilesError;
use photostore_types::{Filename, FilenameError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to create upload directory {path}: {source}", path = path.display())]
    UploadDirCreation {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open content store: {0}")]
    ContentStoreOpen(#[source] FilesError),

    #[error("no file part in request")]
    MissingFile,
    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] FilenameError),
    #[error("upload of {filename} exceeds the maximum of {limit} bytes")]
    PayloadTooLarge { filename: Filename, limit: u64 },

    #[error("failed to save {filename}: {source}")]
    Write {
        filename: Filename,
        #[source]
        source: FilesError,
    },
    #[error("content store error: {0}")]
    Content(#[from] FilesError),

    #[error("metadata store error for {filename}: {source}")]
    Metadata {
        filename: Filename,
        #[source]
        source: MetadataError,
    },
    #[error("metadata store error: {0}")]
    Catalog(#[from] MetadataError),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::MissingFile
                | IngestError::InvalidFilename(_)
                | IngestError::PayloadTooLarge { .. }
        )
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
