// Excel snapshot backend: one `events_{city}.xlsx` workbook per city, one
// "Events" sheet, styled header row.
//
// Read with calamine, written with rust_xlsxwriter. Cell types on read are
// whatever Excel (or a user editing the sheet) left there, so everything is
// flattened to text before decoding.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use eventwatch_core::{City, CommitGate, EventRecord, StorageError, StoragePort};

use crate::columns::{self, Cell, HeaderMap, COLUMN_WIDTHS, HEADERS};
use crate::write_atomically;

pub const SHEET_NAME: &str = "Events";

const HEADER_FILL: u32 = 0x366092;

pub struct ExcelStore {
    dir: PathBuf,
}

impl ExcelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, city: &City) -> PathBuf {
        self.dir.join(format!("events_{}.xlsx", city.slug()))
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn xlsx_error(path: &Path, e: XlsxError) -> StorageError {
    match e {
        XlsxError::IoError(io) => StorageError::Io(format!("{}: {}", path.display(), io)),
        other => StorageError::Io(format!("failed to write {}: {}", path.display(), other)),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        // Someone typed a date into the sheet; keep Excel's serial as text and
        // let the row decoder treat it as unparsed.
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => format!("#{e:?}"),
    }
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
}

fn write_row(sheet: &mut Worksheet, row: u32, record: &EventRecord) -> Result<(), XlsxError> {
    for (col, cell) in columns::encode(record).iter().enumerate() {
        let col = col as u16;
        match cell {
            Cell::Text(s) => sheet.write_string(row, col, s)?,
            Cell::Number(n) => sheet.write_number(row, col, *n)?,
            Cell::Bool(b) => sheet.write_boolean(row, col, *b)?,
        };
    }
    Ok(())
}

fn write_workbook(path: &Path, records: &[EventRecord]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    let header = header_format();
    for (col, name) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
        sheet.set_column_width(col as u16, COLUMN_WIDTHS[col])?;
    }
    for (i, record) in records.iter().enumerate() {
        write_row(sheet, i as u32 + 1, record)?;
    }

    sheet.set_freeze_panes(1, 0)?;
    let last_row = records.len() as u32;
    sheet.autofilter(0, 0, last_row, (HEADERS.len() - 1) as u16)?;

    workbook.save(path)
}

impl StoragePort for ExcelStore {
    fn backend_name(&self) -> &str {
        "excel"
    }

    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError> {
        let path = self.path_for(city);
        if !path.exists() {
            log::info!("no workbook for {} at {}, starting empty", city, path.display());
            return Ok(Vec::new());
        }

        let label = file_label(&path);
        let mut workbook = open_workbook_auto(&path).map_err(|e| StorageError::Corrupt {
            location: label.clone(),
            message: format!("not a readable workbook: {e}"),
        })?;

        // Hand-made sheets may not use our sheet name; fall back to the first.
        let names = workbook.sheet_names();
        let sheet_name = names
            .iter()
            .find(|n| n.as_str() == SHEET_NAME)
            .or_else(|| names.first())
            .cloned();
        let Some(sheet_name) = sheet_name else {
            return Ok(Vec::new());
        };

        let range = workbook.worksheet_range(&sheet_name).map_err(|e| StorageError::Corrupt {
            location: format!("{label} sheet '{sheet_name}'"),
            message: e.to_string(),
        })?;

        // Range coordinates are relative to the first used cell.
        let row_offset = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let header_text: Vec<String> = header_row.iter().map(cell_text).collect();
        let header_map = HeaderMap::new(header_text.iter().map(String::as_str));
        header_map.require_core_columns(&label)?;

        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if columns::is_blank(&cells) {
                continue;
            }
            // Excel rows are 1-based and row 1 of the range is the header.
            let location = format!("{} row {}", label, row_offset + i + 2);
            records.push(columns::decode(&header_map, &cells, city, &location)?);
        }
        log::debug!("loaded {} records for {} from {}", records.len(), city, path.display());
        Ok(records)
    }

    fn save_gated(&self, city: &City, records: &[EventRecord], gate: &CommitGate) -> Result<(), StorageError> {
        let path = self.path_for(city);
        write_atomically(&path, gate, |tmp| write_workbook(tmp, records).map_err(|e| xlsx_error(tmp, e)))
    }
}
