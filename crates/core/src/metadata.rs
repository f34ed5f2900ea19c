//! Durable catalog of accepted media files.
//!
//! The catalog maps each accepted [`Filename`] to the path its bytes were written to. A UNIQUE
//! index on `filename` is the single source of truth for "has this name been accepted": the
//! ingest path checks before writing, but only a successful [`MetadataStore::insert`] makes a
//! submission the owner of a name.
//!
//! Records are created once and never updated. `deleted_at` exists for compatibility with
//! catalogs written by earlier versions of the service; soft-deleted rows are invisible to
//! lookups and listings.

use chrono::{DateTime, NaiveDateTime, Utc};
use photostore_types::Filename;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("a record for {0} already exists")]
    AlreadyExists(Filename),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },
    #[error("storage path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    #[error("size {0} does not fit in the catalog")]
    SizeOutOfRange(u64),
    #[error("metadata store lock poisoned")]
    LockPoisoned,
}

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// A catalog entry for one accepted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub id: i64,
    pub filename: Filename,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields supplied by the caller when inserting a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaRecord {
    pub filename: Filename,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
}

/// Point lookup and insert-if-absent over the catalog.
///
/// Implementations are synchronous; async callers run them on the blocking pool.
pub trait MetadataStore: Send + Sync {
    /// Returns the live record for `filename`, if any.
    fn lookup(&self, filename: &Filename) -> MetadataResult<Option<MediaRecord>>;

    /// Inserts a new record.
    ///
    /// Fails with [`MetadataError::AlreadyExists`] if any row already holds the filename.
    fn insert(&self, record: &NewMediaRecord) -> MetadataResult<MediaRecord>;

    /// Returns all live records in insertion order.
    fn list(&self) -> MetadataResult<Vec<MediaRecord>>;
}

/// SQLite-backed catalog.
///
/// The table layout (`media_files` with `idx_media_files_filename`) matches the catalog the
/// first release of the service created, so existing databases open without migration beyond the added
/// `size_bytes` column.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

struct RecordRow {
    id: i64,
    filename: String,
    path: String,
    size_bytes: Option<i64>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, filename, path, size_bytes, created_at, updated_at, deleted_at FROM media_files";

impl SqliteMetadataStore {
    /// Opens (creating if needed) a file-backed catalog.
    pub fn open(path: &Path) -> MetadataResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory catalog; contents vanish when the store is dropped.
    pub fn open_in_memory() -> MetadataResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> MetadataResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> MetadataResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS media_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                filename TEXT NOT NULL,
                path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Catalogs from before size tracking lack the column.
        if !Self::has_column(conn, "media_files", "size_bytes")? {
            conn.execute(
                "ALTER TABLE media_files ADD COLUMN size_bytes INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_media_files_filename
             ON media_files(filename)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_files_deleted_at
             ON media_files(deleted_at)",
            [],
        )?;

        Ok(())
    }

    fn has_column(conn: &Connection, table: &str, target_column: &str) -> MetadataResult<bool> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let column: String = row.get(1)?;
            if column == target_column {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn conn(&self) -> MetadataResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MetadataError::LockPoisoned)
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
        Ok(RecordRow {
            id: row.get(0)?,
            filename: row.get(1)?,
            path: row.get(2)?,
            size_bytes: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            deleted_at: row.get(6)?,
        })
    }

    fn decode_row(row: RecordRow) -> MetadataResult<MediaRecord> {
        let id = row.id;
        let corrupt = |reason: String| MetadataError::CorruptRecord { id, reason };

        let filename = Filename::new(row.filename).map_err(|e| corrupt(e.to_string()))?;
        let size_bytes = u64::try_from(row.size_bytes.unwrap_or(0))
            .map_err(|_| corrupt("negative size_bytes".into()))?;
        let created_at = parse_timestamp(&row.created_at).map_err(corrupt)?;
        let updated_at = parse_timestamp(&row.updated_at).map_err(corrupt)?;
        let deleted_at = row
            .deleted_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;

        Ok(MediaRecord {
            id,
            filename,
            storage_path: PathBuf::from(row.path),
            size_bytes,
            created_at,
            updated_at,
            deleted_at,
        })
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn lookup(&self, filename: &Filename) -> MetadataResult<Option<MediaRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE filename = ?1 AND deleted_at IS NULL"),
                params![filename.as_str()],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode_row).transpose()
    }

    fn insert(&self, record: &NewMediaRecord) -> MetadataResult<MediaRecord> {
        let path = record
            .storage_path
            .to_str()
            .ok_or_else(|| MetadataError::NonUtf8Path(record.storage_path.clone()))?;
        let size_bytes = i64::try_from(record.size_bytes)
            .map_err(|_| MetadataError::SizeOutOfRange(record.size_bytes))?;
        let now = Utc::now();
        let now_text = now.to_rfc3339();

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO media_files (created_at, updated_at, deleted_at, filename, path, size_bytes)
             VALUES (?1, ?1, NULL, ?2, ?3, ?4)",
            params![now_text, record.filename.as_str(), path, size_bytes],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(MetadataError::AlreadyExists(record.filename.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(MediaRecord {
            id: conn.last_insert_rowid(),
            filename: record.filename.clone(),
            storage_path: record.storage_path.clone(),
            size_bytes: record.size_bytes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    fn list(&self) -> MetadataResult<Vec<MediaRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE deleted_at IS NULL ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], Self::read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::decode_row).collect()
    }
}

/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS[.f][+zz:zz]` form older catalogs used.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ts| ts.and_utc())
        .map_err(|e| format!("invalid timestamp {value:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_record(name: &str) -> NewMediaRecord {
        NewMediaRecord {
            filename: Filename::new(name).unwrap(),
            storage_path: PathBuf::from("uploads").join(name),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_lookup_missing_returns_none() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();

        let found = store.lookup(&Filename::new("missing.png").unwrap()).unwrap();

        assert!(found.is_none());
    }

    #[test]
    fn test_insert_then_lookup() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();

        let inserted = store.insert(&new_record("photo1.png")).unwrap();
        let found = store
            .lookup(&Filename::new("photo1.png").unwrap())
            .unwrap()
            .expect("record should exist");

        assert_eq!(found, inserted);
        assert_eq!(found.storage_path, PathBuf::from("uploads/photo1.png"));
        assert_eq!(found.size_bytes, 2048);
        assert!(found.deleted_at.is_none());
    }

    #[test]
    fn test_insert_duplicate_is_already_exists() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert(&new_record("dup.png")).unwrap();

        let err = store.insert(&new_record("dup.png")).unwrap_err();

        assert!(matches!(err, MetadataError::AlreadyExists(ref f) if f.as_str() == "dup.png"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_filenames_are_case_sensitive() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert(&new_record("Photo.png")).unwrap();
        store.insert(&new_record("photo.png")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_list_in_insertion_order() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert(&new_record("b.png")).unwrap();
        store.insert(&new_record("a.png")).unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.filename.into_inner())
            .collect();

        assert_eq!(names, vec!["b.png", "a.png"]);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("catalog.db");

        {
            let store = SqliteMetadataStore::open(&db_path).unwrap();
            store.insert(&new_record("kept.png")).unwrap();
        }

        let store = SqliteMetadataStore::open(&db_path).unwrap();
        assert!(store
            .lookup(&Filename::new("kept.png").unwrap())
            .unwrap()
            .is_some());
        assert!(matches!(
            store.insert(&new_record("kept.png")),
            Err(MetadataError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_legacy_catalog_gains_size_column_and_keeps_rows() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("photo_sync.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE media_files (
                    id integer PRIMARY KEY AUTOINCREMENT,
                    created_at datetime,
                    updated_at datetime,
                    deleted_at datetime,
                    filename text,
                    path text
                 );
                 CREATE UNIQUE INDEX idx_media_files_filename ON media_files(filename);
                 INSERT INTO media_files (created_at, updated_at, filename, path)
                 VALUES ('2024-05-01 10:00:00.123+00:00', '2024-05-01 10:00:00.123+00:00',
                         'old.jpg', 'uploads/old.jpg');",
            )
            .unwrap();
        }

        let store = SqliteMetadataStore::open(&db_path).unwrap();
        let old = store
            .lookup(&Filename::new("old.jpg").unwrap())
            .unwrap()
            .expect("legacy row should be visible");

        assert_eq!(old.storage_path, PathBuf::from("uploads/old.jpg"));
        assert_eq!(old.size_bytes, 0);
        assert!(matches!(
            store.insert(&new_record("old.jpg")),
            Err(MetadataError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_soft_deleted_rows_are_invisible() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert(&new_record("gone.png")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE media_files SET deleted_at = ?1 WHERE filename = 'gone.png'",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();

        assert!(store
            .lookup(&Filename::new("gone.png").unwrap())
            .unwrap()
            .is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_ok());
        assert!(parse_timestamp("2024-05-01 10:00:00.5+02:00").is_ok());
        assert!(parse_timestamp("2024-05-01 10:00:00").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
