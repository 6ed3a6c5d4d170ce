//! Fiscal quarter bucketing
//!
//! Quarters are fixed week-id ranges from the business calendar, replaced
//! every reporting cycle. They are injected through [`QuarterCalendar`]
//! rather than derived from dates.

use serde::{Deserialize, Serialize};

use crate::week::WeekId;
use crate::ConfigError;

/// Label for weeks outside every configured range
pub const UNKNOWN_QUARTER: &str = "Unknown";

/// An inclusive week-id range mapped to a quarter label
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterRange {
    pub label: String,
    pub start: WeekId,
    pub end: WeekId,
}

impl QuarterRange {
    pub fn new(label: impl Into<String>, start: WeekId, end: WeekId) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, week_id: WeekId) -> bool {
        (self.start..=self.end).contains(&week_id)
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Quarter ranges plus the operator-maintained "current quarter" flag
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarterCalendar {
    /// Label treated as the current quarter. Not inferred from the data.
    pub current_quarter: String,
    /// Checked in order; the first range containing a week wins
    pub quarters: Vec<QuarterRange>,
}

impl Default for QuarterCalendar {
    fn default() -> Self {
        Self {
            current_quarter: "Q4 2025".into(),
            quarters: vec![
                QuarterRange::new("Q3 2025", 202534, 202539),
                QuarterRange::new("Q4 2025", 202540, 202552),
                QuarterRange::new("Q1 2026", 202553, 202605),
            ],
        }
    }
}

impl QuarterCalendar {
    pub fn new(quarters: Vec<QuarterRange>, current_quarter: impl Into<String>) -> Self {
        Self {
            quarters,
            current_quarter: current_quarter.into(),
        }
    }

    /// Quarter label for a week, or [`UNKNOWN_QUARTER`]
    pub fn classify(&self, week_id: WeekId) -> &str {
        self.quarters
            .iter()
            .find(|q| q.contains(week_id))
            .map_or(UNKNOWN_QUARTER, |q| q.label.as_str())
    }

    pub fn is_current(&self, quarter: &str) -> bool {
        quarter == self.current_quarter
    }

    /// Whether the current-quarter label names one of the ranges
    pub fn has_current_range(&self) -> bool {
        self.quarters.iter().any(|q| q.label == self.current_quarter)
    }

    /// Pairs of labels whose ranges overlap
    pub fn overlapping(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for (i, a) in self.quarters.iter().enumerate() {
            for b in &self.quarters[i + 1..] {
                if a.overlaps(b) {
                    pairs.push((a.label.as_str(), b.label.as_str()));
                }
            }
        }
        pairs
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.current_quarter.trim().is_empty() {
            return Err(ConfigError::Invalid("current_quarter must not be empty".into()));
        }
        for q in &self.quarters {
            if q.label.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "quarter range {}..={} has an empty label",
                    q.start, q.end
                )));
            }
            if q.start > q.end {
                return Err(ConfigError::Invalid(format!(
                    "quarter {} starts after it ends ({} > {})",
                    q.label, q.start, q.end
                )));
            }
        }
        Ok(())
    }
}
