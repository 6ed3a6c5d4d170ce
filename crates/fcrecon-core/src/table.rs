//! Wide-format source tables
//!
//! A wide table carries one row per product/customer combination and one
//! column per business week. Cells are resolved into [`CellValue`] once,
//! when the table is read, so nothing downstream inspects raw types again.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::week::{WeekColumn, WeekId};

// ============================================================================
// Cells
// ============================================================================

/// A single spreadsheet cell after read-time classification
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    /// A native numeric cell
    Number(f64),
    /// Text holding a plain numeral, kept verbatim so identifiers such as
    /// `"000456"` survive
    Numeral(String),
    /// Any other non-blank content: currency strings, error sentinels, labels
    Text(String),
    /// Blank or missing
    #[default]
    Empty,
}

impl CellValue {
    /// Classify raw cell text.
    ///
    /// Plain numerals become `Numeral`; currency strings such as
    /// `"$1,200.00"` and sentinels such as `"#N/A"` stay `Text` for the
    /// amount parser.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Numeral(trimmed.to_string()),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    /// Text content with no numeral detection, for cells a source marks as strings
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Render the cell as text. Integral numbers print without a fraction;
    /// numerals print exactly as read.
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Numeral(s) => s.clone(),
            Self::Text(s) => s.trim().to_string(),
            Self::Empty => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Numeral(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// True for `Empty` and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Numeral(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::from_text(&value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// A wide table as read from a source sheet: one header row plus data rows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WideTable {
    /// Source name (sheet or file), used in diagnostics
    pub name: String,
    pub header: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

impl WideTable {
    pub fn new(name: impl Into<String>, header: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            header,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Extract typed rows using the given layout and week columns
    pub fn wide_rows<'a>(
        &'a self,
        layout: &'a ColumnLayout,
        weeks: &'a [WeekColumn],
    ) -> impl Iterator<Item = WideRow> + 'a {
        self.rows
            .iter()
            .map(move |cells| WideRow::from_cells(cells, layout, weeks))
    }
}

/// Column positions of the fixed (non-week) fields in a wide table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub helper_key: usize,
    pub unit_price: usize,
    pub product_type: usize,
    /// Not every source variant carries a customer id column
    pub customer_id: Option<usize>,
    pub customer: usize,
    pub sku: usize,
    /// First column scanned for week headers
    pub week_start: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            helper_key: 0,
            unit_price: 2,
            product_type: 6,
            customer_id: Some(7),
            customer: 8,
            sku: 9,
            week_start: 10,
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One source row with its fixed fields extracted and week cells keyed by week id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WideRow {
    /// Opaque join key shared by the constrained and unconstrained tables
    pub helper_key: String,
    /// Raw unit sell-in price
    pub unit_price: CellValue,
    pub product_type: String,
    pub customer_id: Option<String>,
    pub customer: String,
    pub sku: String,
    /// Raw forecast revenue per week
    pub weeks: HashMap<WeekId, CellValue>,
}

impl WideRow {
    /// Create a row with only a helper key set
    pub fn new(helper_key: impl Into<String>) -> Self {
        Self {
            helper_key: helper_key.into(),
            ..Self::default()
        }
    }

    /// Extract a row from raw cells. Out-of-range columns read as `Empty`.
    pub fn from_cells(cells: &[CellValue], layout: &ColumnLayout, weeks: &[WeekColumn]) -> Self {
        let text = |idx: usize| cells.get(idx).map(CellValue::as_text).unwrap_or_default();

        Self {
            helper_key: text(layout.helper_key),
            unit_price: cells.get(layout.unit_price).cloned().unwrap_or_default(),
            product_type: text(layout.product_type),
            customer_id: layout.customer_id.map(text).filter(|id| !id.is_empty()),
            customer: text(layout.customer),
            sku: text(layout.sku),
            weeks: weeks
                .iter()
                .map(|w| (w.week_id, cells.get(w.position).cloned().unwrap_or_default()))
                .collect(),
        }
    }

    pub fn unit_price(mut self, price: impl Into<CellValue>) -> Self {
        self.unit_price = price.into();
        self
    }

    pub fn product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }

    pub fn customer_id(mut self, id: impl Into<String>) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    pub fn customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = customer.into();
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }

    /// Set the raw forecast cell for a week
    pub fn week(mut self, week_id: WeekId, value: impl Into<CellValue>) -> Self {
        self.weeks.insert(week_id, value.into());
        self
    }

    /// Raw cell for a week, if the row has that week at all
    pub fn cell(&self, week_id: WeekId) -> Option<&CellValue> {
        self.weeks.get(&week_id)
    }

    pub fn has_helper_key(&self) -> bool {
        !self.helper_key.trim().is_empty()
    }

    /// Helper key, customer and SKU are all present
    pub fn has_key_fields(&self) -> bool {
        self.has_helper_key() && !self.customer.trim().is_empty() && !self.sku.trim().is_empty()
    }
}
