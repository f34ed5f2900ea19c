//! Photostore content store
//!
//! This crate owns the bytes of uploaded media. It knows nothing about the catalog: callers decide
//! whether a filename is new, then ask the store to place its bytes.
//!
//! ## Layout
//!
//! Every accepted file lives directly under the content root, named by its original filename:
//!
//! ```text
//! <content_root>/
//! ├── photo1.png
//! ├── IMG_0042.JPG
//! └── .tmp.5f0c…                # in-flight write, renamed into place on success
//! ```
//!
//! ## Write model
//!
//! Writes stream into a uniquely named hidden sibling, are fsynced, then renamed over the final
//! path. A reader of `<content_root>/<filename>` therefore sees either no file or a complete one,
//! never a partial write, even when two uploads of the same name race.
//!
//! ## Example Usage
//!
//! ```no_run
//! use photostore_files::ContentStore;
//! use photostore_types::Filename;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ContentStore::new(Path::new("uploads"), 1024 * 1024 * 1024)?;
//! let name = Filename::new("photo1.png")?;
//! let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"png"))]);
//! let stored = store.write_stream(&name, chunks).await?;
//! println!("{} bytes at {}", stored.size_bytes, stored.path.display());
//! # Ok(())
//! # }
//! ```

mod constants;
mod content;

pub use constants::TEMP_FILE_MARKER;
pub use content::{ContentListing, ContentStore, StoredContent};

/// Errors that can occur during content store operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path is not a direct child of the content root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The incoming stream exceeded the configured maximum
    #[error("Upload exceeds the maximum of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The incoming byte stream failed before it was fully read
    #[error("Failed to read upload stream: {0}")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    /// The underlying cause when the incoming stream, not the disk, failed.
    pub fn stream_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            FilesError::Stream(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
