//! Unconstrained lookup
//!
//! Built once from the unconstrained table before reconciliation starts and
//! read-only afterwards. Entries are keyed by `(helper key, week id)`; a
//! repeated key overwrites the earlier entry and is counted as a duplicate.

use std::borrow::Borrow;
use std::collections::HashMap;

use fcrecon_core::{parse_amount, units_from_revenue, WeekColumn, WeekId, WideRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How many duplicate keys are kept for diagnostics
const DUPLICATE_SAMPLE_LIMIT: usize = 20;

/// Unconstrained values for one (helper key, week)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub units: Decimal,
    pub revenue: Decimal,
    pub unit_price: Decimal,
}

/// Data-quality counters gathered while building the lookup
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupStats {
    /// Rows with a helper key
    pub rows: usize,
    /// Rows skipped for a missing helper key
    pub skipped_rows: usize,
    pub valid_prices: usize,
    pub invalid_prices: usize,
    pub nonzero_forecasts: usize,
    pub zero_forecasts: usize,
    /// Distinct (helper key, week) entries
    pub entries: usize,
    /// Inserts that overwrote an existing entry
    pub duplicate_keys: usize,
}

/// Map from `(helper key, week id)` to [`LookupEntry`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnconstrainedLookup {
    entries: HashMap<String, HashMap<WeekId, LookupEntry>>,
    stats: LookupStats,
    duplicate_sample: Vec<String>,
}

impl UnconstrainedLookup {
    /// Display form of a key: `helperKey_weekId`
    pub fn key(helper_key: &str, week_id: WeekId) -> String {
        format!("{helper_key}_{week_id}")
    }

    pub fn get(&self, helper_key: &str, week_id: WeekId) -> Option<&LookupEntry> {
        self.entries.get(helper_key)?.get(&week_id)
    }

    /// Entry for the key, or all zeros when absent
    pub fn get_or_default(&self, helper_key: &str, week_id: WeekId) -> LookupEntry {
        self.get(helper_key, week_id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stats.entries
    }

    pub fn is_empty(&self) -> bool {
        self.stats.entries == 0
    }

    pub fn stats(&self) -> &LookupStats {
        &self.stats
    }

    pub fn duplicate_keys(&self) -> usize {
        self.stats.duplicate_keys
    }

    /// Up to the first few duplicated keys, in `helperKey_weekId` form
    pub fn duplicate_sample(&self) -> &[String] {
        &self.duplicate_sample
    }

    fn insert(&mut self, helper_key: &str, week_id: WeekId, entry: LookupEntry) {
        let weeks = self.entries.entry(helper_key.to_string()).or_default();
        if weeks.insert(week_id, entry).is_some() {
            self.stats.duplicate_keys += 1;
            if self.duplicate_sample.len() < DUPLICATE_SAMPLE_LIMIT {
                self.duplicate_sample.push(Self::key(helper_key, week_id));
            }
        } else {
            self.stats.entries += 1;
        }
    }
}

/// Build the lookup from unconstrained rows.
///
/// `weeks` are the week columns to read; a row cell missing for a week reads
/// as zero revenue. Rows without a helper key are skipped.
pub fn build_lookup<I>(rows: I, weeks: &[WeekColumn]) -> UnconstrainedLookup
where
    I: IntoIterator,
    I::Item: Borrow<WideRow>,
{
    let mut lookup = UnconstrainedLookup::default();

    for row in rows {
        let row = row.borrow();
        if !row.has_helper_key() {
            lookup.stats.skipped_rows += 1;
            continue;
        }
        lookup.stats.rows += 1;

        let unit_price = parse_amount(&row.unit_price);
        if unit_price > Decimal::ZERO {
            lookup.stats.valid_prices += 1;
        } else {
            lookup.stats.invalid_prices += 1;
        }

        for week in weeks {
            let revenue = row.cell(week.week_id).map_or(Decimal::ZERO, parse_amount);
            if revenue > Decimal::ZERO {
                lookup.stats.nonzero_forecasts += 1;
            } else {
                lookup.stats.zero_forecasts += 1;
            }

            let entry = LookupEntry {
                units: units_from_revenue(revenue, unit_price),
                revenue,
                unit_price,
            };
            lookup.insert(&row.helper_key, week.week_id, entry);
        }
    }

    lookup
}
