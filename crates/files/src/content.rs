//! Content store implementation
//!
//! [`ContentStore`] places uploaded bytes under a single content root. It is deliberately ignorant
//! of the catalog: deciding whether a filename may be written is the caller's job.
//!
//! # Atomicity
//!
//! Each write goes to a hidden temporary sibling (`.tmp.<uuid>`), is fsynced, and is
//! renamed over `<root>/<filename>`. Rename within one directory is atomic, so concurrent writers
//! of the same name each install a complete file and the last rename wins. Temporary files are
//! removed when a write fails; a crash can still leave them behind, which is what
//! [`ContentStore::scan`] reports.

use crate::{FilesError, TEMP_FILE_MARKER};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use photostore_types::Filename;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Result of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Final location of the bytes
    pub path: PathBuf,

    /// Number of bytes written
    pub size_bytes: u64,
}

/// Regular files found directly under the content root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentListing {
    /// Files whose names are valid filenames, sorted by name
    pub files: Vec<(Filename, PathBuf)>,

    /// Leftover temporary files from interrupted writes
    pub temp_files: Vec<PathBuf>,
}

/// Filesystem-backed store for uploaded media bytes.
///
/// Cheap to clone; holds only the root path and the size limit.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root_directory: PathBuf,
    max_bytes: u64,
}

impl ContentStore {
    /// Creates a store rooted at `root_directory`.
    ///
    /// The root is used as given (not canonicalised) so that reported paths match the configured
    /// directory, e.g. `uploads/photo1.png`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root does not exist or is not a
    /// directory.
    pub fn new(root_directory: &Path, max_bytes: u64) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        Ok(Self {
            root_directory: root_directory.to_path_buf(),
            max_bytes,
        })
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Deterministic final location for `filename`: `<root>/<filename>`.
    #[must_use]
    pub fn storage_path(&self, filename: &Filename) -> PathBuf {
        self.root_directory.join(filename.as_str())
    }

    /// Fixed-length temporary name, so any filename that fits a directory entry can be written.
    fn temp_path(&self) -> PathBuf {
        self.root_directory
            .join(format!("{}{}", TEMP_FILE_MARKER, Uuid::new_v4().simple()))
    }

    /// Streams `stream` into the final location for `filename`.
    ///
    /// The stream is consumed to completion. If it yields an error, grows past
    /// [`Self::max_bytes`], or the disk write fails, the temporary file is removed and nothing
    /// appears at the final path. An existing file at the final path is replaced atomically.
    ///
    /// # Errors
    ///
    /// - [`FilesError::Stream`] if the stream yields an error
    /// - [`FilesError::TooLarge`] if the stream exceeds the size limit
    /// - [`FilesError::Io`] if creating, writing, syncing or renaming fails
    #[instrument(skip(self, stream), fields(filename = %filename))]
    pub async fn write_stream<S, E>(
        &self,
        filename: &Filename,
        mut stream: S,
    ) -> Result<StoredContent, FilesError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut upload =
            PendingWrite::create(self.temp_path(), self.storage_path(filename)).await?;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    upload.abort().await;
                    return Err(FilesError::Stream(e.into()));
                }
            };

            if upload.bytes_written + chunk.len() as u64 > self.max_bytes {
                upload.abort().await;
                return Err(FilesError::TooLarge {
                    limit: self.max_bytes,
                });
            }

            if let Err(e) = upload.write(&chunk).await {
                upload.abort().await;
                return Err(e);
            }
        }

        let stored = upload.finish().await?;
        tracing::debug!(
            path = %stored.path.display(),
            size_bytes = stored.size_bytes,
            "content written"
        );
        Ok(stored)
    }

    /// Reads the stored bytes for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Io`] with kind `NotFound` if nothing is stored under that name.
    pub async fn read(&self, filename: &Filename) -> Result<Vec<u8>, FilesError> {
        let path = self.storage_path(filename);
        fs::read(&path).await.map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", path.display(), e),
            ))
        })
    }

    /// Removes a file directly under the content root.
    ///
    /// Returns `Ok(false)` if the file was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if `path` is not a direct child of the root.
    pub async fn remove(&self, path: &Path) -> Result<bool, FilesError> {
        if path.parent() != Some(self.root_directory.as_path()) {
            return Err(FilesError::InvalidPath(format!(
                "{} is not inside {}",
                path.display(),
                self.root_directory.display()
            )));
        }

        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(e)),
        }
    }

    /// Lists regular files directly under the content root.
    ///
    /// Directories, symlinks and non-UTF-8 names are ignored.
    pub async fn scan(&self) -> Result<ContentListing, FilesError> {
        let mut listing = ContentListing::default();
        let mut entries = fs::read_dir(&self.root_directory).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };

            if name.starts_with('.') {
                if name.contains(TEMP_FILE_MARKER) {
                    listing.temp_files.push(entry.path());
                }
                continue;
            }

            if let Ok(filename) = Filename::new(name) {
                listing.files.push((filename, entry.path()));
            }
        }

        listing.files.sort();
        listing.temp_files.sort();
        Ok(listing)
    }
}

/// A write in progress; the temp file is either renamed into place or removed.
struct PendingWrite {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

impl PendingWrite {
    async fn create(temp_path: PathBuf, final_path: PathBuf) -> Result<Self, FilesError> {
        let file = fs::File::create(&temp_path).await.map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", temp_path.display(), e),
            ))
        })?;

        Ok(Self {
            file,
            temp_path,
            final_path,
            bytes_written: 0,
        })
    }

    async fn write(&mut self, data: &Bytes) -> Result<(), FilesError> {
        self.file.write_all(data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(self) -> Result<StoredContent, FilesError> {
        let Self {
            mut file,
            temp_path,
            final_path,
            bytes_written,
        } = self;

        let installed = async {
            file.flush().await?;
            // Data must be on disk before the rename makes it visible.
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = installed {
            let _ = fs::remove_file(&temp_path).await;
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", final_path.display(), e),
            )));
        }

        Ok(StoredContent {
            path: final_path,
            size_bytes: bytes_written,
        })
    }

    async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            tracing::warn!(
                path = %self.temp_path.display(),
                error = %e,
                "failed to remove temporary file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    fn name(s: &str) -> Filename {
        Filename::new(s).unwrap()
    }

    fn dir_entries(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = std_fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("missing");

        let store = ContentStore::new(&root, MIB);

        assert!(matches!(store, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        std_fs::write(&root, "not a directory").unwrap();

        let store = ContentStore::new(&root, MIB);

        assert!(matches!(store, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_storage_path_is_root_and_filename() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();

        assert_eq!(
            store.storage_path(&name("photo1.png")),
            temp.path().join("photo1.png")
        );
    }

    #[tokio::test]
    async fn test_write_stream_concatenates_chunks() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();

        let stored = store
            .write_stream(&name("a.jpg"), chunks(&[b"hello ", b"world"]))
            .await
            .unwrap();

        assert_eq!(stored.path, temp.path().join("a.jpg"));
        assert_eq!(stored.size_bytes, 11);
        assert_eq!(store.read(&name("a.jpg")).await.unwrap(), b"hello world");
        assert_eq!(dir_entries(temp.path()), vec!["a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_write_empty_stream_creates_empty_file() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();

        let stored = store
            .write_stream(&name("empty.png"), chunks(&[]))
            .await
            .unwrap();

        assert_eq!(stored.size_bytes, 0);
        assert!(stored.path.is_file());
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file_whole() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();
        std_fs::write(temp.path().join("a.jpg"), b"old contents that are longer").unwrap();

        store
            .write_stream(&name("a.jpg"), chunks(&[b"new"]))
            .await
            .unwrap();

        assert_eq!(std_fs::read(temp.path().join("a.jpg")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_stream_error_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();
        let failing = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ]);

        let result = store.write_stream(&name("a.jpg"), failing).await;

        assert!(matches!(result, Err(FilesError::Stream(_))));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_too_large_is_rejected_and_cleaned_up() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), 8).unwrap();

        let result = store
            .write_stream(&name("big.mov"), chunks(&[b"12345", b"67890"]))
            .await;

        assert!(matches!(result, Err(FilesError::TooLarge { limit: 8 })));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_exact_limit_is_accepted() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), 10).unwrap();

        let stored = store
            .write_stream(&name("ten.bin"), chunks(&[b"12345", b"67890"]))
            .await
            .unwrap();

        assert_eq!(stored.size_bytes, 10);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();

        let err = store.read(&name("nope.png")).await.unwrap_err();

        assert!(matches!(err, FilesError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_remove_only_inside_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("uploads");
        std_fs::create_dir_all(&root).unwrap();
        let store = ContentStore::new(&root, MIB).unwrap();
        std_fs::write(root.join("a.jpg"), b"x").unwrap();
        std_fs::write(temp.path().join("outside.txt"), b"x").unwrap();

        assert!(store.remove(&root.join("a.jpg")).await.unwrap());
        assert!(!store.remove(&root.join("a.jpg")).await.unwrap());
        assert!(matches!(
            store.remove(&temp.path().join("outside.txt")).await,
            Err(FilesError::InvalidPath(_))
        ));
        assert!(temp.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_scan_separates_files_and_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();
        std_fs::write(temp.path().join("b.png"), b"b").unwrap();
        std_fs::write(temp.path().join("a.png"), b"a").unwrap();
        std_fs::write(temp.path().join(".a.png.tmp.deadbeef"), b"partial").unwrap();
        std_fs::write(temp.path().join(".tmp.0123abcd"), b"partial").unwrap();
        std_fs::write(temp.path().join(".DS_Store"), b"").unwrap();
        std_fs::create_dir(temp.path().join("nested")).unwrap();

        let listing = store.scan().await.unwrap();

        assert_eq!(
            listing.files,
            vec![
                (name("a.png"), temp.path().join("a.png")),
                (name("b.png"), temp.path().join("b.png")),
            ]
        );
        assert_eq!(
            listing.temp_files,
            vec![
                temp.path().join(".a.png.tmp.deadbeef"),
                temp.path().join(".tmp.0123abcd"),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_longest_filename() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();
        let longest = name(&format!(
            "{}.png",
            "a".repeat(photostore_types::MAX_FILENAME_BYTES - 4)
        ));

        let stored = store
            .write_stream(&longest, chunks(&[b"long name"]))
            .await
            .unwrap();

        assert_eq!(stored.path, temp.path().join(longest.as_str()));
        assert_eq!(std_fs::read(&stored.path).unwrap(), b"long name");
        assert!(store.scan().await.unwrap().temp_files.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_of_same_name_install_complete_file() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), MIB).unwrap();
        let payload: &'static [u8] = &[7u8; 64 * 1024];

        let dup = name("dup.png");
        let (a, b) = tokio::join!(
            store.write_stream(&dup, chunks(&[payload, payload])),
            store.write_stream(&dup, chunks(&[payload, payload])),
        );

        assert_eq!(a.unwrap().size_bytes, 128 * 1024);
        assert_eq!(b.unwrap().size_bytes, 128 * 1024);
        let on_disk = std_fs::read(temp.path().join("dup.png")).unwrap();
        assert_eq!(on_disk.len(), 128 * 1024);
        assert!(on_disk.iter().all(|&byte| byte == 7));
        assert_eq!(dir_entries(temp.path()), vec!["dup.png".to_string()]);
    }
}
