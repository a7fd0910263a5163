//! Source adapters.
//!
//! Each adapter turns a city into raw candidate records and classifies its
//! failures as transient or permanent. Retrying whole fetches is the
//! orchestrator's job; adapters only retry individual requests.

pub mod district;
pub mod file;
pub mod html;
pub mod http;

pub use district::{DistrictAdapter, DistrictSettings};
pub use file::FileAdapter;
pub use http::{ClientSettings, PageClient};

/// An adapter could not be constructed.
#[derive(Debug)]
pub enum SourceError {
    /// HTTP client setup failed (TLS backend, bad user agent).
    Client(String),
    /// Built-in HTML pattern failed to compile.
    Pattern(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            SourceError::Pattern(msg) => write!(f, "pattern error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}
