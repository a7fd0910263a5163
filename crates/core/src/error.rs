use std::fmt;

/// A candidate record that can't become an [`crate::EventRecord`]. Skipped
/// individually; never fails the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    MissingField(&'static str),
    /// City is not in the supported set.
    UnsupportedCity(String),
    /// Supported city, but not the one being fetched.
    ForeignCity { expected: String, found: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
            Self::UnsupportedCity(city) => write!(f, "unsupported city '{city}'"),
            Self::ForeignCity { expected, found } => {
                write!(f, "record for '{found}' in a fetch for '{expected}'")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Whether retrying the same request could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

/// Failure of a [`crate::SourceAdapter::fetch`] after the adapter's own
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Transient, message: msg.into() }
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Permanent, message: msg.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FetchErrorKind::Transient => write!(f, "transient fetch error: {}", self.message),
            FetchErrorKind::Permanent => write!(f, "permanent fetch error: {}", self.message),
        }
    }
}

impl std::error::Error for FetchError {}

/// Load/save failure of a [`crate::StoragePort`]. Aborts that city's cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// File/network IO failed.
    Io(String),
    /// Stored data exists but can't be read back as records.
    Corrupt { location: String, message: String },
    /// The operation did not finish within the configured timeout.
    Timeout(String),
    /// The caller gave up on a save before it committed; the previous
    /// snapshot is still in place.
    Withdrawn,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "storage IO error: {msg}"),
            Self::Corrupt { location, message } => {
                write!(f, "corrupt stored data at {location}: {message}")
            }
            Self::Timeout(msg) => write!(f, "storage timeout: {msg}"),
            Self::Withdrawn => write!(f, "save withdrawn before commit"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
