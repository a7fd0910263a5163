// Reads pre-scraped candidates from `{dir}/{city}.json`. Used for fixtures,
// offline runs, and replaying a captured fetch.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use eventwatch_core::{City, FetchError, RawEvent, SourceAdapter};

pub struct FileAdapter {
    dir: PathBuf,
    source_name: String,
}

impl FileAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), source_name: crate::district::SOURCE_NAME.to_string() }
    }

    /// Records produced by this adapter are attributed to `name`.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    /// Tries `{City}.json` first, then the lowercase slug.
    fn path_for(&self, city: &City) -> PathBuf {
        let exact = self.dir.join(format!("{}.json", city.as_str()));
        if exact.exists() {
            return exact;
        }
        self.dir.join(format!("{}.json", city.slug()))
    }
}

impl SourceAdapter for FileAdapter {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn fetch(&self, city: &City) -> Result<Vec<RawEvent>, FetchError> {
        let path = self.path_for(city);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::permanent(format!("no fixture for {city} at {}", path.display())),
            _ => FetchError::transient(format!("reading {}: {e}", path.display())),
        })?;
        let events: Vec<RawEvent> = serde_json::from_str(&text)
            .map_err(|e| FetchError::permanent(format!("{}: {e}", path.display())))?;
        log::debug!("{}: {} candidates from {}", city, events.len(), path.display());
        Ok(events)
    }
}
