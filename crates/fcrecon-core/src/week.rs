//! Week column detection
//!
//! Week headers are numeric `YYYYWW` ids (e.g. `202534`). Only the shape is
//! checked: six digits starting with `202`. The trailing two digits are the
//! business week counter and may run past 52.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::table::CellValue;
use crate::ReconcileError;

/// Business week id in `YYYYWW` form
pub type WeekId = u32;

static WEEK_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^202\d\d\d$").expect("week id pattern is valid"));

/// A header column holding one week of forecast values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekColumn {
    /// Zero-based column index
    pub position: usize,
    pub week_id: WeekId,
}

impl WeekColumn {
    pub const fn new(position: usize, week_id: WeekId) -> Self {
        Self { position, week_id }
    }
}

/// Week id of a header cell, if it is one.
///
/// Only numeric cells and CSV numerals qualify; a workbook string header
/// that merely looks like a week id is ignored.
pub fn week_id_of(cell: &CellValue) -> Option<WeekId> {
    let n = cell.as_number()?;
    let s = n.to_string();
    if WEEK_ID_PATTERN.is_match(&s) {
        s.parse().ok()
    } else {
        None
    }
}

/// Scan `header` from `start_index` for week columns, left to right.
pub fn find_week_columns(
    header: &[CellValue],
    start_index: usize,
) -> Result<Vec<WeekColumn>, ReconcileError> {
    let weeks: Vec<WeekColumn> = header
        .iter()
        .enumerate()
        .skip(start_index)
        .filter_map(|(position, cell)| week_id_of(cell).map(|id| WeekColumn::new(position, id)))
        .collect();

    if weeks.is_empty() {
        return Err(ReconcileError::NoWeekColumnsFound { start_index });
    }
    Ok(weeks)
}

/// Re-locate `weeks` inside another table's header by week id.
///
/// Returns the weeks that `other_header` also has, in the order of `weeks`,
/// with positions taken from `other_header`. Weeks it lacks are dropped.
pub fn align_week_columns(
    weeks: &[WeekColumn],
    other_header: &[CellValue],
    start_index: usize,
) -> Vec<WeekColumn> {
    let mut positions: HashMap<WeekId, usize> = HashMap::new();
    for (position, cell) in other_header.iter().enumerate().skip(start_index) {
        if let Some(id) = week_id_of(cell) {
            positions.insert(id, position);
        }
    }

    weeks
        .iter()
        .filter_map(|w| positions.get(&w.week_id).map(|&p| WeekColumn::new(p, w.week_id)))
        .collect()
}

/// Check a located header against freshness rules.
///
/// Every id in `required` must be present and none in `rejected` may be.
pub fn verify_freshness(
    weeks: &[WeekColumn],
    required: &[WeekId],
    rejected: &[WeekId],
) -> Result<(), ReconcileError> {
    let has = |id: WeekId| weeks.iter().any(|w| w.week_id == id);

    if let Some(missing) = required.iter().copied().find(|&id| !has(id)) {
        return Err(ReconcileError::StaleSource(format!(
            "required week {missing} not found in header"
        )));
    }
    if let Some(stale) = rejected.iter().copied().find(|&id| has(id)) {
        return Err(ReconcileError::StaleSource(format!(
            "week {stale} present in header; this looks like an older extract"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|s| CellValue::from_text(s)).collect()
    }

    #[test]
    fn finds_numeric_week_headers_in_order() {
        let h = header(&["Helper", "Price", "202534", "202535", "Total", "202553"]);
        let weeks = find_week_columns(&h, 0).unwrap();
        assert_eq!(
            weeks,
            vec![
                WeekColumn::new(2, 202534),
                WeekColumn::new(3, 202535),
                WeekColumn::new(5, 202553),
            ]
        );
    }

    #[test]
    fn respects_start_index() {
        let h = header(&["202530", "x", "202534"]);
        let weeks = find_week_columns(&h, 1).unwrap();
        assert_eq!(weeks, vec![WeekColumn::new(2, 202534)]);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert_eq!(week_id_of(&CellValue::Number(202534.0)), Some(202534));
        assert_eq!(week_id_of(&CellValue::Number(201934.0)), None);
        assert_eq!(week_id_of(&CellValue::Number(2025340.0)), None);
        assert_eq!(week_id_of(&CellValue::Number(202534.5)), None);
        assert_eq!(week_id_of(&CellValue::Number(20253.0)), None);
        assert_eq!(week_id_of(&CellValue::Numeral("202534".into())), Some(202534));
        assert_eq!(week_id_of(&CellValue::Text("202534".into())), None);
        assert_eq!(week_id_of(&CellValue::Text("W202534".into())), None);
        assert_eq!(week_id_of(&CellValue::Empty), None);
    }

    #[test]
    fn empty_result_is_an_error() {
        let h = header(&["Helper", "Customer", "SKU"]);
        let err = find_week_columns(&h, 0).unwrap_err();
        assert!(matches!(err, ReconcileError::NoWeekColumnsFound { start_index: 0 }));
    }

    #[test]
    fn align_uses_other_positions_and_drops_missing() {
        let weeks = vec![
            WeekColumn::new(10, 202534),
            WeekColumn::new(11, 202535),
            WeekColumn::new(12, 202536),
        ];
        let other = header(&["H", "", "202536", "202534"]);
        let aligned = align_week_columns(&weeks, &other, 0);
        assert_eq!(
            aligned,
            vec![WeekColumn::new(3, 202534), WeekColumn::new(2, 202536)]
        );
    }

    #[test]
    fn freshness_guard() {
        let weeks = vec![WeekColumn::new(0, 202534), WeekColumn::new(1, 202535)];
        assert!(verify_freshness(&weeks, &[202534], &[202529]).is_ok());
        assert!(verify_freshness(&weeks, &[], &[]).is_ok());

        let err = verify_freshness(&weeks, &[202540], &[]).unwrap_err();
        assert!(err.to_string().contains("202540"));

        let err = verify_freshness(&weeks, &[], &[202535]).unwrap_err();
        assert!(err.to_string().contains("202535"));
    }
}
