//! # fcrecon-core
//!
//! Core domain model for reconciling a constrained and an unconstrained
//! weekly demand forecast.
//!
//! This crate provides:
//! - Source model: `CellValue`, `WideTable`, `WideRow`, `ColumnLayout`
//! - Cell parsing: `parse_amount` (total, never fails)
//! - Week header detection: `find_week_columns`, `align_week_columns`
//! - Quarter bucketing: `QuarterCalendar`
//! - Output model: `ReconciledRecord`, `OutputSchema`, the `RecordSink` trait
//! - Configuration and error types
//!
//! ## Example
//!
//! ```rust
//! use fcrecon_core::{parse_amount, CellValue, QuarterCalendar};
//! use rust_decimal::Decimal;
//!
//! assert_eq!(parse_amount(&CellValue::from("$5,460.00")), Decimal::new(546000, 2));
//! assert_eq!(parse_amount(&CellValue::from("#N/A")), Decimal::ZERO);
//!
//! let calendar = QuarterCalendar::default();
//! assert_eq!(calendar.classify(202534), "Q3 2025");
//! ```

pub mod amount;
pub mod config;
pub mod quarter;
pub mod sink;
pub mod summary;
pub mod table;
pub mod week;

pub use amount::{parse_amount, parse_amount_str, units_from_revenue};
pub use config::{
    BatchConfig, EmissionCandidate, EmissionPolicy, OutputConfig, ReconcileConfig,
    ValidationConfig,
};
pub use quarter::{QuarterCalendar, QuarterRange, UNKNOWN_QUARTER};
pub use sink::MemorySink;
pub use summary::{GapSummary, GapSummaryBuilder};
pub use table::{CellValue, ColumnLayout, WideRow, WideTable};
pub use week::{align_week_columns, find_week_columns, verify_freshness, WeekColumn, WeekId};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Record enums
// ============================================================================

/// Which forecast series an output record belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForecastType {
    Constrained,
    Unconstrained,
}

impl ForecastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastType::Constrained => "Constrained",
            ForecastType::Unconstrained => "Unconstrained",
        }
    }
}

impl std::fmt::Display for ForecastType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presence/absence marker consumed downstream as the literal text
/// `"Supply Gap"` or an empty string
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapFlag {
    SupplyGap,
    #[default]
    None,
}

impl GapFlag {
    /// Gap detection is on units, never on revenue
    pub fn from_delta_units(delta_units: Decimal) -> Self {
        if delta_units < Decimal::ZERO {
            GapFlag::SupplyGap
        } else {
            GapFlag::None
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, GapFlag::SupplyGap)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GapFlag::SupplyGap => "Supply Gap",
            GapFlag::None => "",
        }
    }
}

impl std::fmt::Display for GapFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-row data quality, decided by the unit price
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataQuality {
    Good,
    PriceIssue,
}

impl DataQuality {
    pub fn from_unit_price(unit_price: Decimal) -> Self {
        if unit_price <= Decimal::ZERO {
            DataQuality::PriceIssue
        } else {
            DataQuality::Good
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Good => "Good",
            DataQuality::PriceIssue => "Price Issue",
        }
    }
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Reconciled Record
// ============================================================================

/// One row of the long-format output table. Never mutated once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub customer: String,
    pub customer_id: Option<String>,
    pub sku: String,
    pub product_type: String,
    pub forecast_type: ForecastType,
    pub quarter: String,
    pub week_id: WeekId,
    pub forecast_units: Decimal,
    pub forecast_revenue: Decimal,
    /// Constrained minus unconstrained; zero on baseline records
    pub delta_units: Decimal,
    pub delta_revenue: Decimal,
    pub gap_flag: GapFlag,
    pub is_current_quarter: bool,
    pub helper_key: String,
    pub unit_price: Decimal,
    pub data_quality: Option<DataQuality>,
}

impl ReconciledRecord {
    /// Value of one output column
    pub fn field(&self, column: OutputColumn) -> FieldValue<'_> {
        match column {
            OutputColumn::Customer => FieldValue::Text(&self.customer),
            OutputColumn::CustomerId => FieldValue::Text(self.customer_id.as_deref().unwrap_or("")),
            OutputColumn::Sku => FieldValue::Text(&self.sku),
            OutputColumn::ProductType => FieldValue::Text(&self.product_type),
            OutputColumn::ForecastType => FieldValue::Text(self.forecast_type.as_str()),
            OutputColumn::Quarter => FieldValue::Text(&self.quarter),
            OutputColumn::WeekId => FieldValue::Integer(i64::from(self.week_id)),
            OutputColumn::ForecastUnits => FieldValue::Decimal(self.forecast_units),
            OutputColumn::ForecastRevenue => FieldValue::Decimal(self.forecast_revenue),
            OutputColumn::DeltaUnits => FieldValue::Decimal(self.delta_units),
            OutputColumn::DeltaRevenue => FieldValue::Decimal(self.delta_revenue),
            OutputColumn::GapFlag => FieldValue::Text(self.gap_flag.as_str()),
            OutputColumn::IsCurrentQuarter => FieldValue::Bool(self.is_current_quarter),
            OutputColumn::HelperKey => FieldValue::Text(&self.helper_key),
            OutputColumn::UnitPrice => FieldValue::Decimal(self.unit_price),
            OutputColumn::DataQuality => {
                FieldValue::Text(self.data_quality.as_ref().map_or("", DataQuality::as_str))
            }
        }
    }
}

// ============================================================================
// Output Schema
// ============================================================================

/// Columns of the output table, in contract order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputColumn {
    Customer,
    CustomerId,
    Sku,
    ProductType,
    ForecastType,
    Quarter,
    WeekId,
    ForecastUnits,
    ForecastRevenue,
    DeltaUnits,
    DeltaRevenue,
    GapFlag,
    IsCurrentQuarter,
    HelperKey,
    UnitPrice,
    DataQuality,
}

impl OutputColumn {
    pub fn header(&self) -> &'static str {
        match self {
            OutputColumn::Customer => "Customer",
            OutputColumn::CustomerId => "CustomerId",
            OutputColumn::Sku => "SKU",
            OutputColumn::ProductType => "ProductType",
            OutputColumn::ForecastType => "ForecastType",
            OutputColumn::Quarter => "Quarter",
            OutputColumn::WeekId => "WeekId",
            OutputColumn::ForecastUnits => "ForecastUnits",
            OutputColumn::ForecastRevenue => "ForecastRevenue",
            OutputColumn::DeltaUnits => "DeltaUnits",
            OutputColumn::DeltaRevenue => "DeltaRevenue",
            OutputColumn::GapFlag => "GapFlag",
            OutputColumn::IsCurrentQuarter => "IsCurrentQuarter",
            OutputColumn::HelperKey => "HelperKey",
            OutputColumn::UnitPrice => "UnitPrice",
            OutputColumn::DataQuality => "DataQuality",
        }
    }
}

/// A typed output cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    Decimal(Decimal),
    Bool(bool),
}

/// Which optional columns the output table carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSchema {
    pub customer_id: bool,
    pub data_quality: bool,
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self {
            customer_id: true,
            data_quality: true,
        }
    }
}

impl OutputSchema {
    pub fn columns(&self) -> Vec<OutputColumn> {
        use OutputColumn as C;
        let mut cols = vec![C::Customer];
        if self.customer_id {
            cols.push(C::CustomerId);
        }
        cols.extend([
            C::Sku,
            C::ProductType,
            C::ForecastType,
            C::Quarter,
            C::WeekId,
            C::ForecastUnits,
            C::ForecastRevenue,
            C::DeltaUnits,
            C::DeltaRevenue,
            C::GapFlag,
            C::IsCurrentQuarter,
            C::HelperKey,
            C::UnitPrice,
        ]);
        if self.data_quality {
            cols.push(C::DataQuality);
        }
        cols
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns().iter().map(OutputColumn::header).collect()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Destination for reconciled records
///
/// The batch writer calls `begin` once, then `write_batch` for each batch in
/// order, then `finish`. A batch always starts right after the previous
/// one; writing the same `start` again must replace that region, so a
/// retried batch never duplicates rows.
pub trait RecordSink {
    /// Write the header row
    fn begin(&mut self, schema: &OutputSchema) -> Result<(), SinkError>;

    /// Write `batch` as data rows starting at zero-based data row `start`
    fn write_batch(&mut self, start: usize, batch: &[ReconciledRecord]) -> Result<(), SinkError>;

    /// Finalize the destination. Also called after a cancelled run.
    fn finish(&mut self, summary: &GapSummary) -> Result<(), SinkError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Structural failure of a reconciliation run
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("No week columns found at or after column {start_index}: expected numeric YYYYWW headers such as 202534")]
    NoWeekColumnsFound { start_index: usize },

    #[error("Missing input table: {0}")]
    MissingTable(String),

    #[error("Stale source data: {0}")]
    StaleSource(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Batch {batch} failed after {attempts} attempts: {source}")]
    WriteFailed {
        batch: usize,
        attempts: u32,
        #[source]
        source: SinkError,
    },

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Destination write error
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Out of order write: expected row {expected}, got {got}")]
    OutOfOrder { expected: usize, got: usize },
}

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn record() -> ReconciledRecord {
        ReconciledRecord {
            customer: "Acme".into(),
            customer_id: Some("C-7".into()),
            sku: "SKU1".into(),
            product_type: "Chargers".into(),
            forecast_type: ForecastType::Constrained,
            quarter: "Q3 2025".into(),
            week_id: 202534,
            forecast_units: dec!(10),
            forecast_revenue: dec!(100),
            delta_units: dec!(-5),
            delta_revenue: dec!(-50),
            gap_flag: GapFlag::SupplyGap,
            is_current_quarter: false,
            helper_key: "H1".into(),
            unit_price: dec!(10),
            data_quality: Some(DataQuality::Good),
        }
    }

    #[test]
    fn gap_flag_is_unit_based() {
        assert_eq!(GapFlag::from_delta_units(dec!(-0.0001)), GapFlag::SupplyGap);
        assert_eq!(GapFlag::from_delta_units(Decimal::ZERO), GapFlag::None);
        assert_eq!(GapFlag::from_delta_units(dec!(3)), GapFlag::None);
        assert_eq!(GapFlag::SupplyGap.as_str(), "Supply Gap");
        assert_eq!(GapFlag::None.as_str(), "");
    }

    #[test]
    fn data_quality_from_price() {
        assert_eq!(DataQuality::from_unit_price(dec!(10)), DataQuality::Good);
        assert_eq!(DataQuality::from_unit_price(Decimal::ZERO), DataQuality::PriceIssue);
        assert_eq!(DataQuality::from_unit_price(dec!(-1)), DataQuality::PriceIssue);
        assert_eq!(format!("{}", DataQuality::PriceIssue), "Price Issue");
    }

    #[test]
    fn full_schema_column_order() {
        assert_eq!(
            OutputSchema::default().headers(),
            vec![
                "Customer",
                "CustomerId",
                "SKU",
                "ProductType",
                "ForecastType",
                "Quarter",
                "WeekId",
                "ForecastUnits",
                "ForecastRevenue",
                "DeltaUnits",
                "DeltaRevenue",
                "GapFlag",
                "IsCurrentQuarter",
                "HelperKey",
                "UnitPrice",
                "DataQuality",
            ]
        );
    }

    #[test]
    fn minimal_schema_drops_optional_columns() {
        let schema = OutputSchema {
            customer_id: false,
            data_quality: false,
        };
        let headers = schema.headers();
        assert_eq!(headers.len(), 14);
        assert_eq!(headers[1], "SKU");
        assert_eq!(headers[13], "UnitPrice");
    }

    #[test]
    fn record_fields() {
        let r = record();
        assert_eq!(r.field(OutputColumn::CustomerId), FieldValue::Text("C-7"));
        assert_eq!(r.field(OutputColumn::ForecastType), FieldValue::Text("Constrained"));
        assert_eq!(r.field(OutputColumn::WeekId), FieldValue::Integer(202534));
        assert_eq!(r.field(OutputColumn::DeltaRevenue), FieldValue::Decimal(dec!(-50)));
        assert_eq!(r.field(OutputColumn::GapFlag), FieldValue::Text("Supply Gap"));
        assert_eq!(r.field(OutputColumn::IsCurrentQuarter), FieldValue::Bool(false));
        assert_eq!(r.field(OutputColumn::DataQuality), FieldValue::Text("Good"));

        let bare = ReconciledRecord {
            customer_id: None,
            data_quality: None,
            ..record()
        };
        assert_eq!(bare.field(OutputColumn::CustomerId), FieldValue::Text(""));
        assert_eq!(bare.field(OutputColumn::DataQuality), FieldValue::Text(""));
    }

    #[test]
    fn error_messages() {
        let err = ReconcileError::NoWeekColumnsFound { start_index: 10 };
        assert!(err.to_string().contains("column 10"));

        let err = ReconcileError::MissingTable("NEW WIDE UNCONST. FCST DATA".into());
        assert!(err.to_string().contains("NEW WIDE UNCONST. FCST DATA"));

        let err = ReconcileError::WriteFailed {
            batch: 4,
            attempts: 3,
            source: SinkError::Format("disk full".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("Batch 4"));
        assert!(msg.contains("disk full"));
    }
}
