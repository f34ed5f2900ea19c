//! Ingest coordination: the accept-or-reject decision for uploads.
//!
//! [`IngestService::submit`] runs a check-then-write-then-insert sequence without any
//! application-level lock. Correctness against concurrent submissions of the same filename rests
//! on two properties:
//!
//! - the catalog's UNIQUE index admits exactly one insert per filename, and
//! - the content store installs files by atomic rename, so racing writers never leave a torn
//!   file at the final path.
//!
//! The record is inserted only after the bytes are durably in place, so a visible record always
//! has complete content behind it. The reverse window (bytes in place, insert failed) is left to
//! [`IngestService::reconcile`](crate::IngestService::reconcile): submit never unlinks a final
//! path, since a concurrent submission of the same name may own the file there by then.

use crate::config::CoreConfig;
use crate::metadata::{
    MediaRecord, MetadataError, MetadataResult, MetadataStore, NewMediaRecord, SqliteMetadataStore,
};
use crate::{IngestError, IngestResult};
use bytes::Bytes;
use futures::Stream;
use photostore_files::{ContentStore, FilesError};
use photostore_types::Filename;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of an accepted-or-rejected submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The filename was new; bytes and record are both committed.
    Created { record: MediaRecord },
    /// The filename was already recorded; nothing was written by this call.
    Conflict { existing: MediaRecord },
}

impl SubmitOutcome {
    /// The record that owns the filename after this call.
    pub fn record(&self) -> &MediaRecord {
        match self {
            SubmitOutcome::Created { record } => record,
            SubmitOutcome::Conflict { existing } => existing,
        }
    }
}

/// Coordinates the content store and the catalog.
///
/// Built once at startup and shared (behind an `Arc`) by every request handler.
#[derive(Clone)]
pub struct IngestService {
    content: ContentStore,
    metadata: Arc<dyn MetadataStore>,
}

impl std::fmt::Debug for IngestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestService")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl IngestService {
    pub fn new(content: ContentStore, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { content, metadata }
    }

    /// Bootstraps the upload directory, opens the SQLite catalog and the content store.
    pub fn from_config(cfg: &CoreConfig) -> IngestResult<Self> {
        cfg.ensure_upload_dir()?;
        let metadata = SqliteMetadataStore::open(cfg.database_path())?;
        let content = ContentStore::new(cfg.upload_dir(), cfg.max_upload_bytes())
            .map_err(IngestError::ContentStoreOpen)?;

        tracing::info!(
            upload_dir = %cfg.upload_dir().display(),
            database_path = %cfg.database_path().display(),
            max_upload_bytes = cfg.max_upload_bytes(),
            "ingest service ready"
        );

        Ok(Self::new(content, Arc::new(metadata)))
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Runs a catalog operation on the blocking pool.
    pub(crate) async fn with_metadata<T, F>(&self, op: F) -> IngestResult<MetadataResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MetadataStore) -> MetadataResult<T> + Send + 'static,
    {
        let metadata = Arc::clone(&self.metadata);
        Ok(tokio::task::spawn_blocking(move || op(metadata.as_ref())).await?)
    }

    /// Existence query: the live record for `filename`, if any.
    pub async fn lookup(&self, filename: &Filename) -> IngestResult<Option<MediaRecord>> {
        let key = filename.clone();
        self.with_metadata(move |store| store.lookup(&key))
            .await?
            .map_err(|source| IngestError::Metadata {
                filename: filename.clone(),
                source,
            })
    }

    /// All live records in insertion order.
    pub async fn list(&self) -> IngestResult<Vec<MediaRecord>> {
        Ok(self.with_metadata(|store| store.list()).await??)
    }

    /// Accepts `content` under `filename` unless the name is already recorded.
    ///
    /// On a catalog hit the stream is never polled. On a miss the stream is written to
    /// `<upload_dir>/<filename>` and then recorded. If a concurrent submission records the name
    /// first, this call reports [`SubmitOutcome::Conflict`] with the winner's record; the file
    /// at the shared path is left alone since it belongs to the winner.
    ///
    /// # Errors
    ///
    /// - [`IngestError::PayloadTooLarge`] if the stream exceeds the configured limit
    /// - [`IngestError::Write`] if the bytes could not be written; no record is created
    /// - [`IngestError::Metadata`] if the catalog lookup or insert fails for a reason other than
    ///   the uniqueness constraint; a file this call placed stays for reconcile to report
    #[instrument(skip(self, content), fields(filename = %filename))]
    pub async fn submit<S, E>(&self, filename: Filename, content: S) -> IngestResult<SubmitOutcome>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if let Some(existing) = self.lookup(&filename).await? {
            tracing::info!(
                path = %existing.storage_path.display(),
                "duplicate submission rejected"
            );
            return Ok(SubmitOutcome::Conflict { existing });
        }

        let stored = match self.content.write_stream(&filename, content).await {
            Ok(stored) => stored,
            Err(FilesError::TooLarge { limit }) => {
                return Err(IngestError::PayloadTooLarge { filename, limit });
            }
            Err(source) => return Err(IngestError::Write { filename, source }),
        };

        let new_record = NewMediaRecord {
            filename: filename.clone(),
            storage_path: stored.path.clone(),
            size_bytes: stored.size_bytes,
        };

        match self.with_metadata(move |store| store.insert(&new_record)).await? {
            Ok(record) => {
                tracing::info!(
                    path = %record.storage_path.display(),
                    size_bytes = record.size_bytes,
                    "media file created"
                );
                Ok(SubmitOutcome::Created { record })
            }
            Err(MetadataError::AlreadyExists(_)) => {
                // Lost the race on the unique index after both writers passed the lookup.
                match self.lookup(&filename).await? {
                    Some(existing) => {
                        tracing::info!(
                            path = %existing.storage_path.display(),
                            "concurrent submission won; rejecting as duplicate"
                        );
                        Ok(SubmitOutcome::Conflict { existing })
                    }
                    None => Err(IngestError::Metadata {
                        source: MetadataError::AlreadyExists(filename.clone()),
                        filename,
                    }),
                }
            }
            Err(source) => {
                // The final path is shared with any concurrent submission of this name, so it
                // may already hold that submission's bytes. Only reconcile may remove it.
                tracing::error!(
                    error = %source,
                    path = %stored.path.display(),
                    "catalog insert failed after content write; file left for reconcile"
                );
                Err(IngestError::Metadata { filename, source })
            }
        }
    }
}
