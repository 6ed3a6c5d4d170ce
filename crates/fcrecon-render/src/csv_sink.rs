//! CSV record sink

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fcrecon_core::{GapSummary, OutputColumn, OutputSchema, ReconciledRecord, RecordSink, SinkError};

use crate::field_text;

/// Writes the output table to a CSV file.
///
/// The byte offset of every data row is tracked so that a batch rewritten at
/// an earlier start row truncates the file there first.
pub struct CsvSink {
    file: File,
    columns: Vec<OutputColumn>,
    /// `offsets[i]` is where data row `i` starts; the last entry is the end of file
    offsets: Vec<u64>,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self {
            file,
            columns: Vec::new(),
            offsets: vec![0],
        })
    }

    /// Data rows currently in the file
    pub fn rows_written(&self) -> usize {
        self.offsets.len() - 1
    }

    fn replace_from(&mut self, offset: u64, bytes: &[u8]) -> Result<(), SinkError> {
        self.file.set_len(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        Ok(())
    }
}

fn csv_error(e: impl std::fmt::Display) -> SinkError {
    SinkError::Format(format!("CSV write failed: {e}"))
}

impl RecordSink for CsvSink {
    fn begin(&mut self, schema: &OutputSchema) -> Result<(), SinkError> {
        self.columns = schema.columns();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(self.columns.iter().map(OutputColumn::header))
            .map_err(csv_error)?;
        let header = writer.into_inner().map_err(csv_error)?;

        self.replace_from(0, &header)?;
        self.offsets = vec![header.len() as u64];
        Ok(())
    }

    fn write_batch(&mut self, start: usize, batch: &[ReconciledRecord]) -> Result<(), SinkError> {
        let rows = self.rows_written();
        if start > rows {
            return Err(SinkError::OutOfOrder {
                expected: rows,
                got: start,
            });
        }
        let base = self.offsets[start];

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut ends = Vec::with_capacity(batch.len());
        for record in batch {
            writer
                .write_record(self.columns.iter().map(|&c| field_text(record.field(c))))
                .map_err(csv_error)?;
            writer.flush()?;
            ends.push(base + writer.get_ref().len() as u64);
        }
        let bytes = writer.into_inner().map_err(csv_error)?;

        self.replace_from(base, &bytes)?;
        self.offsets.truncate(start + 1);
        self.offsets.extend(ends);
        Ok(())
    }

    fn finish(&mut self, _summary: &GapSummary) -> Result<(), SinkError> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcrecon_core::{DataQuality, ForecastType, GapFlag};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn record(week_id: u32, customer: &str) -> ReconciledRecord {
        ReconciledRecord {
            customer: customer.into(),
            customer_id: Some("C-1".into()),
            sku: "SKU1".into(),
            product_type: "Chargers".into(),
            forecast_type: ForecastType::Constrained,
            quarter: "Q3 2025".into(),
            week_id,
            forecast_units: dec!(10),
            forecast_revenue: dec!(100.00),
            delta_units: dec!(-5),
            delta_revenue: dec!(-50),
            gap_flag: GapFlag::SupplyGap,
            is_current_quarter: false,
            helper_key: "H1".into(),
            unit_price: dec!(10.00),
            data_quality: Some(DataQuality::Good),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();

        sink.begin(&OutputSchema::default()).unwrap();
        sink.write_batch(0, &[record(202534, "Acme, Inc.")]).unwrap();
        sink.finish(&GapSummary::default()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Customer,CustomerId,SKU,ProductType,ForecastType,Quarter,WeekId,ForecastUnits,\
             ForecastRevenue,DeltaUnits,DeltaRevenue,GapFlag,IsCurrentQuarter,HelperKey,\
             UnitPrice,DataQuality"
        );
        assert_eq!(
            lines[1],
            "\"Acme, Inc.\",C-1,SKU1,Chargers,Constrained,Q3 2025,202534,10,100,-5,-50,\
             Supply Gap,FALSE,H1,10,Good"
        );
    }

    #[test]
    fn rewriting_a_batch_replaces_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.begin(&OutputSchema { customer_id: false, data_quality: false }).unwrap();

        sink.write_batch(0, &[record(202534, "A"), record(202535, "A")]).unwrap();
        // Partial write of the second batch, then the retry
        sink.write_batch(2, &[record(202536, "B")]).unwrap();
        sink.write_batch(2, &[record(202536, "B"), record(202537, "B")]).unwrap();

        assert_eq!(sink.rows_written(), 4);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert_eq!(text.matches("202536").count(), 1);
    }

    #[test]
    fn rejects_gaps_in_row_order() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(&dir.path().join("out.csv")).unwrap();
        sink.begin(&OutputSchema::default()).unwrap();
        let err = sink.write_batch(3, &[record(202534, "A")]).unwrap_err();
        assert!(matches!(err, SinkError::OutOfOrder { expected: 0, got: 3 }));
    }
}
