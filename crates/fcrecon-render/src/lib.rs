//! # fcrecon-render
//!
//! Destinations for reconciled records.
//!
//! This crate provides:
//! - `CsvSink`: flat CSV output, the format most downstream dashboards read
//! - `XlsxSink`: an Excel workbook with the data sheet plus supply-gap summary sheets
//! - `write_summary_json`: the gap summary as pretty-printed JSON
//!
//! All sinks implement [`fcrecon_core::RecordSink`]. Batches rewritten at the
//! same start row replace the earlier rows, so a retried batch never appears
//! twice in the output.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fcrecon_render::open_sink;
//!
//! let mut sink = open_sink(Path::new("reconciled.xlsx"))?;
//! let report = pipeline.run(&constrained, &unconstrained, sink.as_mut())?;
//! ```

pub mod csv_sink;
pub mod excel;
pub mod json;

pub use csv_sink::CsvSink;
pub use excel::XlsxSink;
pub use json::{summary_to_json, write_summary_json};

use std::path::Path;

use fcrecon_core::{FieldValue, RecordSink, SinkError};
use rust_decimal::Decimal;

/// Decimal places kept in text output
pub const TEXT_DECIMAL_PLACES: u32 = 6;

/// Output file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Xlsx,
}

impl OutputFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// Open a file sink chosen by the path's extension
pub fn open_sink(path: &Path) -> Result<Box<dyn RecordSink>, SinkError> {
    match OutputFormat::detect(path) {
        Some(OutputFormat::Csv) => Ok(Box::new(CsvSink::create(path)?)),
        Some(OutputFormat::Xlsx) => Ok(Box::new(XlsxSink::create(path))),
        None => Err(SinkError::Format(format!(
            "unsupported output format: {} (expected .csv or .xlsx)",
            path.display()
        ))),
    }
}

/// Text form of a decimal: rounded, trailing zeros dropped
pub fn format_decimal(value: Decimal) -> String {
    value.round_dp(TEXT_DECIMAL_PLACES).normalize().to_string()
}

/// Text form of an output cell
pub fn field_text(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Text(s) => s.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Decimal(d) => format_decimal(d),
        FieldValue::Bool(true) => "TRUE".into(),
        FieldValue::Bool(false) => "FALSE".into(),
    }
}
