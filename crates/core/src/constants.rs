//! Defaults used when the environment does not override them.

/// Default content root, relative to the working directory.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default SQLite catalog location.
pub const DEFAULT_DATABASE_PATH: &str = "photo_sync.db";

/// Default ceiling on a single upload: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// Default REST listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
