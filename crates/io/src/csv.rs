// CSV snapshot backend: one `events_{city}.csv` per city.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use eventwatch_core::{City, CommitGate, EventRecord, StorageError, StoragePort};

use crate::columns::{self, Cell, HeaderMap, HEADERS};
use crate::write_atomically;

pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, city: &City) -> PathBuf {
        self.dir.join(format!("events_{}.csv", city.slug()))
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Decode file bytes, falling back to Windows-1252 (what Excel uses when a
/// user re-saves the sheet as CSV).
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            decoded.into_owned()
        }
    }
}

fn csv_error(path: &Path, e: ::csv::Error) -> StorageError {
    match e.kind() {
        ::csv::ErrorKind::Io(_) => StorageError::Io(format!("{}: {}", path.display(), e)),
        _ => StorageError::Corrupt {
            location: file_label(path),
            message: e.to_string(),
        },
    }
}

impl StoragePort for CsvStore {
    fn backend_name(&self) -> &str {
        "csv"
    }

    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError> {
        let path = self.path_for(city);
        let content = match fs::read(&path) {
            Ok(bytes) => decode_text(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("no snapshot for {} at {}, starting empty", city, path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::Io(format!("{}: {}", path.display(), e))),
        };

        let label = file_label(&path);
        let mut reader = ::csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(|e| csv_error(&path, e))?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Ok(Vec::new());
        }
        let header_map = HeaderMap::new(headers.iter());
        header_map.require_core_columns(&label)?;

        let mut records = Vec::new();
        for (i, row) in reader.records().enumerate() {
            let row = row.map_err(|e| csv_error(&path, e))?;
            let cells: Vec<String> = row.iter().map(str::to_string).collect();
            if columns::is_blank(&cells) {
                continue;
            }
            // Row 1 is the header.
            let location = format!("{} row {}", label, i + 2);
            records.push(columns::decode(&header_map, &cells, city, &location)?);
        }
        log::debug!("loaded {} records for {} from {}", records.len(), city, path.display());
        Ok(records)
    }

    fn save_gated(&self, city: &City, records: &[EventRecord], gate: &CommitGate) -> Result<(), StorageError> {
        let path = self.path_for(city);
        write_atomically(&path, gate, |tmp| {
            let mut writer = ::csv::Writer::from_path(tmp).map_err(|e| csv_error(tmp, e))?;
            writer.write_record(HEADERS).map_err(|e| csv_error(tmp, e))?;
            for record in records {
                let row: Vec<String> = columns::encode(record).iter().map(Cell::to_text).collect();
                writer.write_record(&row).map_err(|e| csv_error(tmp, e))?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}
