//! In-memory record sink

use crate::{GapSummary, OutputSchema, ReconciledRecord, RecordSink, SinkError};

/// Collects records in memory; useful for tests and for callers that post-process
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub headers: Vec<&'static str>,
    pub records: Vec<ReconciledRecord>,
    /// Number of `write_batch` calls that succeeded
    pub batches: usize,
    pub summary: Option<GapSummary>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }
}

impl RecordSink for MemorySink {
    fn begin(&mut self, schema: &OutputSchema) -> Result<(), SinkError> {
        self.headers = schema.headers();
        self.records.clear();
        Ok(())
    }

    fn write_batch(&mut self, start: usize, batch: &[ReconciledRecord]) -> Result<(), SinkError> {
        if start > self.records.len() {
            return Err(SinkError::OutOfOrder {
                expected: self.records.len(),
                got: start,
            });
        }
        // Rewriting a region replaces it
        self.records.truncate(start);
        self.records.extend_from_slice(batch);
        self.batches += 1;
        Ok(())
    }

    fn finish(&mut self, summary: &GapSummary) -> Result<(), SinkError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForecastType, GapFlag};
    use rust_decimal::Decimal;

    fn record(week_id: u32) -> ReconciledRecord {
        ReconciledRecord {
            customer: "Acme".into(),
            customer_id: None,
            sku: "SKU1".into(),
            product_type: String::new(),
            forecast_type: ForecastType::Constrained,
            quarter: "Q3 2025".into(),
            week_id,
            forecast_units: Decimal::ZERO,
            forecast_revenue: Decimal::ZERO,
            delta_units: Decimal::ZERO,
            delta_revenue: Decimal::ZERO,
            gap_flag: GapFlag::None,
            is_current_quarter: false,
            helper_key: "H1".into(),
            unit_price: Decimal::ZERO,
            data_quality: None,
        }
    }

    #[test]
    fn rewrite_replaces_region() {
        let mut sink = MemorySink::new();
        sink.begin(&OutputSchema::default()).unwrap();
        sink.write_batch(0, &[record(1), record(2)]).unwrap();
        sink.write_batch(2, &[record(3)]).unwrap();
        sink.write_batch(2, &[record(3)]).unwrap();
        assert_eq!(sink.records.len(), 3);
        assert_eq!(sink.records[2].week_id, 3);
    }

    #[test]
    fn gap_in_rows_is_rejected() {
        let mut sink = MemorySink::new();
        sink.begin(&OutputSchema::default()).unwrap();
        let err = sink.write_batch(5, &[record(1)]).unwrap_err();
        assert!(matches!(err, SinkError::OutOfOrder { expected: 0, got: 5 }));
    }
}
