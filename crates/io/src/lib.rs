//! Snapshot storage backends.
//!
//! Each backend keeps one snapshot per city and implements
//! [`eventwatch_core::StoragePort`]. File backends never leave a half-written
//! snapshot behind: they write a sibling temp file and rename it over the
//! previous one.

pub mod columns;
pub mod csv;
pub mod memory;
pub mod xlsx;

use std::fs;
use std::path::{Path, PathBuf};

use eventwatch_core::{CommitGate, StorageError};

pub use crate::csv::CsvStore;
pub use crate::memory::MemoryStore;
pub use crate::xlsx::ExcelStore;

/// Sibling temp path for an atomic write. Lives in the same directory so the
/// final rename never crosses filesystems.
fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Write via `write_fn` to a temp file, then rename over `target`.
///
/// On failure, or if `gate` was withdrawn by the time the temp file is
/// complete, the temp file is removed and `target` is untouched.
pub(crate) fn write_atomically<F>(target: &Path, gate: &CommitGate, write_fn: F) -> Result<(), StorageError>
where
    F: FnOnce(&Path) -> Result<(), StorageError>,
{
    if let Some(dir) = target.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let tmp = temp_path_for(target);
    if let Err(e) = write_fn(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if !gate.try_commit() {
        let _ = fs::remove_file(&tmp);
        log::debug!("save of {} withdrawn; keeping the previous file", target.display());
        return Err(StorageError::Withdrawn);
    }
    if let Err(e) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(StorageError::Io(format!(
            "failed to replace {}: {}",
            target.display(),
            e
        )));
    }
    log::debug!("wrote {}", target.display());
    Ok(())
}
