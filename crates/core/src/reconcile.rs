//! Consistency pass between the content store and the catalog.
//!
//! The two stores share no transaction. A crash between a file's rename and its catalog insert
//! leaves an orphaned file; a crash mid-write leaves a temporary file. [`IngestService::reconcile`]
//! finds both and can remove them.
//!
//! Run it while the server is stopped: a submission between its rename and insert looks exactly
//! like an orphan.

use crate::{IngestResult, IngestService};
use photostore_files::FilesError;
use photostore_types::Filename;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Files in the content root that no record owns.
    pub orphaned_files: Vec<PathBuf>,
    /// Leftovers from interrupted writes.
    pub stale_temp_files: Vec<PathBuf>,
    /// Records whose bytes are gone. Reported only; records are never deleted.
    pub missing_content: Vec<Filename>,
    /// Number of files deleted when run with `remove = true`.
    pub removed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_files.is_empty()
            && self.stale_temp_files.is_empty()
            && self.missing_content.is_empty()
    }
}

impl IngestService {
    /// Compares the content root against the catalog.
    ///
    /// Ownership is by filename: a file named `a.jpg` is owned if a live record for `a.jpg`
    /// exists, wherever that record says it was stored.
    pub async fn reconcile(&self, remove: bool) -> IngestResult<ReconcileReport> {
        let records = self.list().await?;
        let listing = self.content().scan().await?;

        let owned: HashSet<&Filename> = records.iter().map(|r| &r.filename).collect();
        let mut report = ReconcileReport {
            orphaned_files: listing
                .files
                .into_iter()
                .filter(|(name, _)| !owned.contains(name))
                .map(|(_, path)| path)
                .collect(),
            stale_temp_files: listing.temp_files,
            ..ReconcileReport::default()
        };

        for record in &records {
            if !tokio::fs::try_exists(&record.storage_path)
                .await
                .map_err(FilesError::from)?
            {
                report.missing_content.push(record.filename.clone());
            }
        }

        if remove {
            for path in report
                .orphaned_files
                .iter()
                .chain(report.stale_temp_files.iter())
            {
                if self.content().remove(path).await? {
                    tracing::info!(path = %path.display(), "removed unreferenced file");
                    report.removed += 1;
                }
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                orphaned = report.orphaned_files.len(),
                stale_temp = report.stale_temp_files.len(),
                missing = report.missing_content.len(),
                removed = report.removed,
                "content store and catalog disagree"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataStore, NewMediaRecord, SqliteMetadataStore};
    use bytes::Bytes;
    use photostore_files::ContentStore;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn name(s: &str) -> Filename {
        Filename::new(s).unwrap()
    }

    async fn setup(temp: &TempDir) -> (IngestService, Arc<SqliteMetadataStore>) {
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let content = ContentStore::new(temp.path(), 1024).unwrap();
        let svc = IngestService::new(content, metadata.clone());
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"ok"))]);
        svc.submit(name("kept.png"), body).await.unwrap();
        (svc, metadata)
    }

    #[tokio::test]
    async fn test_consistent_store_is_clean() {
        let temp = TempDir::new().unwrap();
        let (svc, _) = setup(&temp).await;

        let report = svc.reconcile(false).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.removed, 0);
    }

    #[tokio::test]
    async fn test_reports_without_removing() {
        let temp = TempDir::new().unwrap();
        let (svc, metadata) = setup(&temp).await;
        fs::write(temp.path().join("orphan.jpg"), b"no record").unwrap();
        fs::write(temp.path().join(".orphan.jpg.tmp.0123"), b"half").unwrap();
        metadata
            .insert(&NewMediaRecord {
                filename: name("lost.png"),
                storage_path: temp.path().join("lost.png"),
                size_bytes: 3,
            })
            .unwrap();

        let report = svc.reconcile(false).await.unwrap();

        assert_eq!(report.orphaned_files, vec![temp.path().join("orphan.jpg")]);
        assert_eq!(
            report.stale_temp_files,
            vec![temp.path().join(".orphan.jpg.tmp.0123")]
        );
        assert_eq!(report.missing_content, vec![name("lost.png")]);
        assert_eq!(report.removed, 0);
        assert!(temp.path().join("orphan.jpg").exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_orphans_but_not_owned_files() {
        let temp = TempDir::new().unwrap();
        let (svc, _) = setup(&temp).await;
        fs::write(temp.path().join("orphan.jpg"), b"no record").unwrap();
        fs::write(temp.path().join(".kept.png.tmp.0123"), b"half").unwrap();

        let report = svc.reconcile(true).await.unwrap();

        assert_eq!(report.removed, 2);
        assert!(!temp.path().join("orphan.jpg").exists());
        assert!(!temp.path().join(".kept.png.tmp.0123").exists());
        assert!(temp.path().join("kept.png").exists());
        assert!(svc.reconcile(false).await.unwrap().is_clean());
    }
}
