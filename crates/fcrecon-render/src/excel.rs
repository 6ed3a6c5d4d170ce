//! Excel record sink
//!
//! Produces a workbook with the flat output table on the first sheet and
//! one sheet per supply-gap summary:
//! - Reconciled: every emitted record, header frozen, autofilter on
//! - Gap Summary: headline totals and revenue at risk per quarter
//! - Gaps by SKU / Gaps by Customer: ranked by revenue impact
//! - Gaps by Week / Gaps by Product Type
//!
//! Supply-gap rows are tinted on the data sheet so they stand out when the
//! workbook is opened directly.
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: Gaps by SKU
//! | Rank | SKU  | Product Type | Gap Units | Revenue Impact | Customers Affected |
//! |------|------|--------------|-----------|----------------|--------------------|
//! | 1    | SKU2 | Cables       | 10        | 100.00         | 1                  |
//! | 2    | SKU1 | Chargers     | 3         | 30.00          | 2                  |
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use fcrecon_core::{
    FieldValue, GapSummary, OutputColumn, OutputSchema, ReconciledRecord, RecordSink, SinkError,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

const DATA_SHEET: &str = "Reconciled";

fn xlsx_error(e: XlsxError) -> SinkError {
    SinkError::Format(format!("Excel write failed: {e}"))
}

/// Writes the output table and gap summaries to an xlsx workbook.
///
/// The workbook is held in memory and saved by `finish`. Rewriting a batch
/// at an earlier start row overwrites the same cells.
pub struct XlsxSink {
    path: Option<PathBuf>,
    workbook: Workbook,
    formats: SheetFormats,
    columns: Vec<OutputColumn>,
    started: bool,
    rows: usize,
    buffer: Option<Vec<u8>>,
}

impl XlsxSink {
    /// Sink that saves to `path` when finished
    pub fn create(path: &Path) -> Self {
        Self::build(Some(path.to_path_buf()))
    }

    /// Sink that keeps the finished workbook in memory; see [`buffer`](Self::buffer)
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    fn build(path: Option<PathBuf>) -> Self {
        Self {
            path,
            workbook: Workbook::new(),
            formats: SheetFormats::new(),
            columns: Vec::new(),
            started: false,
            rows: 0,
            buffer: None,
        }
    }

    /// Workbook bytes of a finished in-memory sink
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    fn data_sheet(&mut self) -> Result<&mut Worksheet, SinkError> {
        self.workbook.worksheet_from_index(0).map_err(xlsx_error)
    }

    fn add_summary_sheets(&mut self, summary: &GapSummary) -> Result<(), XlsxError> {
        let f = &self.formats;

        // Headline totals
        let sheet = self.workbook.add_worksheet();
        sheet.set_name("Gap Summary")?;
        sheet.merge_range(0, 0, 0, 1, "SUPPLY GAP SUMMARY", &f.header)?;
        let totals = &summary.totals;
        let generated = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let lines: [(&str, SummaryCell); 7] = [
            ("Generated", SummaryCell::Text(generated)),
            ("Total Records", SummaryCell::Count(totals.total_records)),
            ("Supply Gap Records", SummaryCell::Count(totals.supply_gap_records)),
            ("Revenue at Risk", SummaryCell::Money(totals.revenue_at_risk)),
            ("Units at Risk", SummaryCell::Units(totals.units_at_risk)),
            ("SKUs Affected", SummaryCell::Count(totals.skus_affected)),
            ("Customers Affected", SummaryCell::Count(totals.customers_affected)),
        ];
        for (i, (label, value)) in lines.iter().enumerate() {
            let row = i as u32 + 2;
            sheet.write_with_format(row, 0, *label, &f.text)?;
            value.write(sheet, row, 1, f)?;
        }

        let top = lines.len() as u32 + 3;
        sheet.merge_range(top, 0, top, 1, "REVENUE AT RISK BY QUARTER", &f.header)?;
        for (i, q) in summary.by_quarter.iter().enumerate() {
            let row = top + 1 + i as u32;
            sheet.write_with_format(row, 0, q.quarter.as_str(), &f.text)?;
            SummaryCell::Money(q.revenue_impact).write(sheet, row, 1, f)?;
        }
        sheet.set_column_width(0, 24)?;
        sheet.set_column_width(1, 20)?;

        write_table(
            self.workbook.add_worksheet(),
            "Gaps by SKU",
            &["Rank", "SKU", "Product Type", "Gap Units", "Revenue Impact", "Customers Affected"],
            summary.by_sku.iter().map(|g| {
                vec![
                    SummaryCell::Count(g.rank),
                    SummaryCell::Text(g.sku.clone()),
                    SummaryCell::Text(g.product_type.clone()),
                    SummaryCell::Units(g.gap_units),
                    SummaryCell::Money(g.revenue_impact),
                    SummaryCell::Count(g.customers_affected),
                ]
            }),
            f,
        )?;

        write_table(
            self.workbook.add_worksheet(),
            "Gaps by Customer",
            &["Rank", "Customer", "Gap Units", "Revenue Impact", "SKUs Affected"],
            summary.by_customer.iter().map(|g| {
                vec![
                    SummaryCell::Count(g.rank),
                    SummaryCell::Text(g.customer.clone()),
                    SummaryCell::Units(g.gap_units),
                    SummaryCell::Money(g.revenue_impact),
                    SummaryCell::Count(g.skus_affected),
                ]
            }),
            f,
        )?;

        write_table(
            self.workbook.add_worksheet(),
            "Gaps by Week",
            &["Week", "Quarter", "Gap Units", "Revenue Impact", "Records"],
            summary.by_week.iter().map(|g| {
                vec![
                    SummaryCell::Count(g.week_id as usize),
                    SummaryCell::Text(g.quarter.clone()),
                    SummaryCell::Units(g.gap_units),
                    SummaryCell::Money(g.revenue_impact),
                    SummaryCell::Count(g.records),
                ]
            }),
            f,
        )?;

        write_table(
            self.workbook.add_worksheet(),
            "Gaps by Product Type",
            &["Product Type", "Gap Units", "Revenue Impact", "Customers Affected"],
            summary.by_product_type.iter().map(|g| {
                vec![
                    SummaryCell::Text(g.product_type.clone()),
                    SummaryCell::Units(g.gap_units),
                    SummaryCell::Money(g.revenue_impact),
                    SummaryCell::Count(g.customers_affected),
                ]
            }),
            f,
        )?;

        Ok(())
    }
}

impl RecordSink for XlsxSink {
    fn begin(&mut self, schema: &OutputSchema) -> Result<(), SinkError> {
        if self.started {
            return Err(SinkError::Format("workbook already started".into()));
        }
        self.started = true;
        self.columns = schema.columns();

        let sheet = self.workbook.add_worksheet();
        sheet.set_name(DATA_SHEET).map_err(xlsx_error)?;
        for (col, column) in self.columns.iter().enumerate() {
            let col = col as u16;
            sheet
                .write_with_format(0, col, column.header(), &self.formats.header)
                .map_err(xlsx_error)?;
            sheet
                .set_column_width(col, column_width(*column))
                .map_err(xlsx_error)?;
        }
        sheet.set_freeze_panes(1, 0).map_err(xlsx_error)?;
        Ok(())
    }

    fn write_batch(&mut self, start: usize, batch: &[ReconciledRecord]) -> Result<(), SinkError> {
        if start > self.rows {
            return Err(SinkError::OutOfOrder {
                expected: self.rows,
                got: start,
            });
        }

        let columns = self.columns.clone();
        let formats = self.formats.clone();
        let sheet = self.data_sheet()?;

        for (i, record) in batch.iter().enumerate() {
            let row = (start + i + 1) as u32;
            let gap = record.gap_flag.is_gap();
            for (col, &column) in columns.iter().enumerate() {
                let col = col as u16;
                let written = match record.field(column) {
                    FieldValue::Text(s) => {
                        let fmt = if gap { &formats.gap_text } else { &formats.text };
                        sheet.write_with_format(row, col, s, fmt)
                    }
                    FieldValue::Integer(n) => {
                        sheet.write_number_with_format(row, col, n as f64, &formats.integer)
                    }
                    FieldValue::Decimal(d) => {
                        let fmt = match column {
                            OutputColumn::ForecastRevenue
                            | OutputColumn::DeltaRevenue
                            | OutputColumn::UnitPrice => &formats.currency,
                            _ => &formats.number,
                        };
                        sheet.write_number_with_format(row, col, to_f64(d), fmt)
                    }
                    FieldValue::Bool(b) => sheet.write_boolean_with_format(row, col, b, &formats.text),
                };
                written.map_err(xlsx_error)?;
            }
        }

        self.rows = start + batch.len();
        Ok(())
    }

    fn finish(&mut self, summary: &GapSummary) -> Result<(), SinkError> {
        let rows = self.rows as u32;
        let last_col = self.columns.len().saturating_sub(1) as u16;
        if rows > 0 {
            self.data_sheet()?
                .autofilter(0, 0, rows, last_col)
                .map_err(xlsx_error)?;
        }

        self.add_summary_sheets(summary).map_err(xlsx_error)?;

        match &self.path {
            Some(path) => self.workbook.save(path).map_err(xlsx_error)?,
            None => self.buffer = Some(self.workbook.save_to_buffer().map_err(xlsx_error)?),
        }
        Ok(())
    }
}

// ============================================================================
// Summary tables
// ============================================================================

enum SummaryCell {
    Text(String),
    Count(usize),
    Units(Decimal),
    Money(Decimal),
}

impl SummaryCell {
    fn write(&self, sheet: &mut Worksheet, row: u32, col: u16, f: &SheetFormats) -> Result<(), XlsxError> {
        match self {
            Self::Text(s) => sheet.write_with_format(row, col, s.as_str(), &f.text)?,
            Self::Count(n) => sheet.write_number_with_format(row, col, *n as f64, &f.integer)?,
            Self::Units(d) => sheet.write_number_with_format(row, col, to_f64(*d), &f.number)?,
            Self::Money(d) => sheet.write_number_with_format(row, col, to_f64(*d), &f.currency)?,
        };
        Ok(())
    }
}

fn write_table<I>(
    sheet: &mut Worksheet,
    name: &str,
    headers: &[&str],
    rows: I,
    f: &SheetFormats,
) -> Result<(), XlsxError>
where
    I: IntoIterator<Item = Vec<SummaryCell>>,
{
    sheet.set_name(name)?;
    for (col, header) in headers.iter().enumerate() {
        let col = col as u16;
        sheet.write_with_format(0, col, *header, &f.header)?;
        sheet.set_column_width(col, 18)?;
    }
    for (i, cells) in rows.into_iter().enumerate() {
        let row = i as u32 + 1;
        for (col, cell) in cells.iter().enumerate() {
            cell.write(sheet, row, col as u16, f)?;
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn column_width(column: OutputColumn) -> f64 {
    match column {
        OutputColumn::Customer | OutputColumn::HelperKey => 28.0,
        OutputColumn::Sku | OutputColumn::ProductType => 18.0,
        OutputColumn::ForecastType | OutputColumn::IsCurrentQuarter => 16.0,
        _ => 14.0,
    }
}

/// Reusable cell formats
#[derive(Clone)]
struct SheetFormats {
    header: Format,
    text: Format,
    integer: Format,
    number: Format,
    currency: Format,
    gap_text: Format,
}

impl SheetFormats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_background_color(0x4472C4)
                .set_font_color(0xFFFFFF)
                .set_border(FormatBorder::Thin),
            text: Format::new().set_border(FormatBorder::Thin),
            integer: Format::new()
                .set_num_format("0")
                .set_border(FormatBorder::Thin),
            number: Format::new()
                .set_num_format("#,##0.00")
                .set_border(FormatBorder::Thin),
            currency: Format::new()
                .set_num_format("$#,##0.00;-$#,##0.00")
                .set_border(FormatBorder::Thin),
            gap_text: Format::new()
                .set_background_color(0xFCE4D6) // Light red
                .set_border(FormatBorder::Thin),
        }
    }
}
