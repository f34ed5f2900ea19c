//! Validated value types shared across the photostore crates.

/// Errors that can occur when validating a submitted filename.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilenameError {
    /// The filename was empty
    #[error("filename cannot be empty")]
    Empty,

    /// The filename would resolve outside the content root
    #[error("filename must not contain path separators or NUL: {0:?}")]
    PathSeparator(String),

    /// `.`, `..` and other leading-dot names are reserved
    #[error("filename must not start with '.': {0:?}")]
    Reserved(String),

    /// The filename is longer than a single directory entry allows
    #[error("filename is {len} bytes; the maximum is {max}")]
    TooLong { len: usize, max: usize },
}

/// Longest accepted filename in bytes (`NAME_MAX` on common filesystems).
pub const MAX_FILENAME_BYTES: usize = 255;

/// The identity key of a stored media file.
///
/// Filenames are kept verbatim: no trimming and no case folding, so `Photo.png` and `photo.png`
/// are distinct files. Construction only rejects names that could not be stored as a single
/// entry directly under the content root.
///
/// Names starting with `.` are rejected because the content store uses hidden sibling files for
/// in-flight writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Filename(String);

impl Filename {
    /// Validates `input` as a filename.
    ///
    /// # Errors
    ///
    /// Returns [`FilenameError`] if the input is empty, longer than [`MAX_FILENAME_BYTES`],
    /// contains `/`, `\` or NUL, or starts with `.`.
    pub fn new(input: impl Into<String>) -> Result<Self, FilenameError> {
        let input = input.into();
        if input.is_empty() {
            return Err(FilenameError::Empty);
        }
        if input.len() > MAX_FILENAME_BYTES {
            return Err(FilenameError::TooLong {
                len: input.len(),
                max: MAX_FILENAME_BYTES,
            });
        }
        if input.contains(['/', '\\', '\0']) {
            return Err(FilenameError::PathSeparator(input));
        }
        if input.starts_with('.') {
            return Err(FilenameError::Reserved(input));
        }
        Ok(Self(input))
    }

    /// Returns the filename as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Filename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Filename {
    type Err = FilenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for Filename {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Filename {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Filename::new(s).map_err(serde::de::Error::custom)
    }
}
