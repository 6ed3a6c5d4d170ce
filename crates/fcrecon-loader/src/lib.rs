//! # fcrecon-loader
//!
//! Source loader for wide forecast tables. CSV files are read with `csv`;
//! workbooks (xlsx, xlsm, xlsb, xls, ods) with `calamine`. Every cell is
//! classified into a [`CellValue`] here, once, so the engine never sees raw
//! spreadsheet types.
//!
//! The first row of a source is its header. Column positions are preserved:
//! a sheet whose used range starts at column C still reports column C as
//! index 2.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use fcrecon_core::{CellValue, WideTable};
use thiserror::Error;
use tracing::{debug, info};

/// Source loading failure
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Sheet '{sheet}' not found (available: {})", .available.join(", "))]
    MissingSheet {
        sheet: String,
        available: Vec<String>,
    },

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),
}

/// Supported source formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    /// Detect from a file extension
    pub fn detect(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Workbook),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load a wide table from `path`.
///
/// `sheet` selects a workbook sheet (the first sheet when `None`); it is
/// ignored for CSV sources.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<WideTable, LoadError> {
    match SourceFormat::detect(path)? {
        SourceFormat::Csv => load_csv(path),
        SourceFormat::Workbook => load_sheet(path, sheet),
    }
}

/// Load a CSV file. The table is named after the file stem.
pub fn load_csv(path: &Path) -> Result<WideTable, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
    let table = read_csv(name, file)?;
    info!(path = %path.display(), rows = table.row_count(), "loaded csv");
    Ok(table)
}

/// Read CSV data from any reader
pub fn read_csv<R: Read>(name: impl Into<String>, reader: R) -> Result<WideTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_text).collect::<Vec<_>>());
    }

    let header = if rows.is_empty() {
        Vec::new()
    } else {
        rows.remove(0)
    };
    Ok(WideTable::new(name, header, rows))
}

/// Load one sheet of a workbook. The table is named after the sheet.
pub fn load_sheet(path: &Path, sheet: Option<&str>) -> Result<WideTable, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names().to_vec();

    let name = match sheet {
        Some(wanted) => available
            .iter()
            .find(|s| s.as_str() == wanted)
            .cloned()
            .ok_or_else(|| LoadError::MissingSheet {
                sheet: wanted.to_string(),
                available: available.clone(),
            })?,
        None => available.first().cloned().ok_or(LoadError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&name)?;
    let table = table_from_range(name, &range);
    info!(
        path = %path.display(),
        sheet = %table.name,
        rows = table.row_count(),
        "loaded sheet"
    );
    Ok(table)
}

/// Convert a used range into a table, keeping absolute column positions
pub fn table_from_range(name: impl Into<String>, range: &Range<Data>) -> WideTable {
    let name = name.into();
    let col_offset = range.start().map_or(0, |(_, col)| col as usize);
    if col_offset > 0 {
        debug!(sheet = %name, col_offset, "used range does not start at column A");
    }

    let mut rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|r| {
            let mut cells = vec![CellValue::Empty; col_offset];
            cells.extend(r.iter().map(cell_value));
            cells
        })
        .collect();

    let header = if rows.is_empty() {
        Vec::new()
    } else {
        rows.remove(0)
    };
    WideTable::new(name, header, rows)
}

/// Classify one workbook cell.
///
/// String cells stay text even when they hold digits; the workbook already
/// says which cells are numbers.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Float(f) if f.is_finite() => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::String(s) => CellValue::text(s),
        Data::Error(e) => CellValue::Text(e.to_string()),
        other => CellValue::from_text(&other.to_string()),
    }
}
