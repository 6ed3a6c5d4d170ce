//! Reconciliation driver
//!
//! Walks the constrained rows week by week, joins each (row, week) against
//! the unconstrained lookup and emits a Constrained/Unconstrained record
//! pair for every pair that passes the emission policy. Output is lazy: the
//! driver is an iterator and holds at most one pending record.

use fcrecon_core::{
    parse_amount, units_from_revenue, DataQuality, EmissionCandidate, EmissionPolicy, ForecastType,
    GapFlag, QuarterCalendar, ReconcileConfig, ReconciledRecord, WeekColumn, WideRow,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lookup::{LookupEntry, UnconstrainedLookup};

/// Row and pair counters for one reconciliation pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub rows_seen: usize,
    /// Rows with helper key, customer and SKU
    pub rows_processed: usize,
    /// Rows skipped for a missing key field
    pub rows_skipped: usize,
    /// Processed rows whose unit price is zero, negative or unparseable
    pub price_issue_rows: usize,
    /// (row, week) pairs that produced output
    pub pairs_emitted: usize,
    /// (row, week) pairs dropped by the emission policy
    pub pairs_suppressed: usize,
}

/// Per-run reconciliation settings
#[derive(Clone, Debug)]
pub struct Reconciler {
    calendar: QuarterCalendar,
    policy: EmissionPolicy,
    data_quality: bool,
}

impl Reconciler {
    pub fn new(calendar: QuarterCalendar, policy: EmissionPolicy) -> Self {
        Self {
            calendar,
            policy,
            data_quality: true,
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            calendar: config.calendar.clone(),
            policy: config.emission.clone(),
            data_quality: config.output.data_quality,
        }
    }

    /// Whether records carry a data-quality classification
    pub fn data_quality(mut self, enabled: bool) -> Self {
        self.data_quality = enabled;
        self
    }

    /// Stream reconciled records for `rows` in emission order.
    ///
    /// The lookup must be fully built; it is only read here.
    pub fn reconcile<'a>(
        &'a self,
        rows: &'a [WideRow],
        lookup: &'a UnconstrainedLookup,
        weeks: &'a [WeekColumn],
    ) -> RecordStream<'a> {
        RecordStream {
            reconciler: self,
            rows: rows.iter(),
            lookup,
            weeks,
            current: None,
            week_index: 0,
            pending: None,
            stats: ReconcileStats::default(),
        }
    }

    /// Records for one (row, week), or `None` when the policy suppresses it
    fn reconcile_week(
        &self,
        row: RowState<'_>,
        week: WeekColumn,
        lookup: &UnconstrainedLookup,
    ) -> Option<(ReconciledRecord, ReconciledRecord)> {
        let revenue = row.row.cell(week.week_id).map_or(Decimal::ZERO, parse_amount);
        let units = units_from_revenue(revenue, row.unit_price);
        let entry: LookupEntry = lookup.get_or_default(&row.row.helper_key, week.week_id);

        let delta_units = units - entry.units;
        let delta_revenue = revenue - entry.revenue;

        let candidate = EmissionCandidate {
            constrained_revenue: revenue,
            unconstrained_revenue: entry.revenue,
            delta_units,
            delta_revenue,
        };
        if !self.policy.should_emit(&candidate) {
            return None;
        }

        let quarter = self.calendar.classify(week.week_id).to_string();
        let is_current_quarter = self.calendar.is_current(&quarter);
        let data_quality = self.data_quality.then_some(row.data_quality);

        let constrained = ReconciledRecord {
            customer: row.row.customer.clone(),
            customer_id: row.row.customer_id.clone(),
            sku: row.row.sku.clone(),
            product_type: row.row.product_type.clone(),
            forecast_type: ForecastType::Constrained,
            quarter,
            week_id: week.week_id,
            forecast_units: units,
            forecast_revenue: revenue,
            delta_units,
            delta_revenue,
            gap_flag: GapFlag::from_delta_units(delta_units),
            is_current_quarter,
            helper_key: row.row.helper_key.clone(),
            unit_price: row.unit_price,
            data_quality,
        };

        let unconstrained = ReconciledRecord {
            forecast_type: ForecastType::Unconstrained,
            forecast_units: entry.units,
            forecast_revenue: entry.revenue,
            delta_units: Decimal::ZERO,
            delta_revenue: Decimal::ZERO,
            gap_flag: GapFlag::None,
            unit_price: if entry.unit_price.is_zero() {
                row.unit_price
            } else {
                entry.unit_price
            },
            ..constrained.clone()
        };

        Some((constrained, unconstrained))
    }
}

/// Values computed once per constrained row
#[derive(Clone, Copy)]
struct RowState<'a> {
    row: &'a WideRow,
    unit_price: Decimal,
    data_quality: DataQuality,
}

/// Lazy record stream returned by [`Reconciler::reconcile`]
pub struct RecordStream<'a> {
    reconciler: &'a Reconciler,
    rows: std::slice::Iter<'a, WideRow>,
    lookup: &'a UnconstrainedLookup,
    weeks: &'a [WeekColumn],
    current: Option<RowState<'a>>,
    week_index: usize,
    pending: Option<ReconciledRecord>,
    stats: ReconcileStats,
}

impl RecordStream<'_> {
    /// Counters so far; final once the stream is exhausted
    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }
}

impl Iterator for RecordStream<'_> {
    type Item = ReconciledRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.take() {
                return Some(record);
            }

            let Some(state) = self.current else {
                let row = self.rows.next()?;
                self.stats.rows_seen += 1;
                if !row.has_key_fields() {
                    self.stats.rows_skipped += 1;
                    continue;
                }
                self.stats.rows_processed += 1;

                let unit_price = parse_amount(&row.unit_price);
                let data_quality = DataQuality::from_unit_price(unit_price);
                if data_quality == DataQuality::PriceIssue {
                    self.stats.price_issue_rows += 1;
                }
                self.current = Some(RowState {
                    row,
                    unit_price,
                    data_quality,
                });
                self.week_index = 0;
                continue;
            };

            let Some(&week) = self.weeks.get(self.week_index) else {
                self.current = None;
                continue;
            };
            self.week_index += 1;

            match self.reconciler.reconcile_week(state, week, self.lookup) {
                Some((constrained, unconstrained)) => {
                    self.stats.pairs_emitted += 1;
                    self.pending = Some(unconstrained);
                    return Some(constrained);
                }
                None => self.stats.pairs_suppressed += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::build_lookup;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn weeks() -> Vec<WeekColumn> {
        vec![WeekColumn::new(10, 202534), WeekColumn::new(11, 202540)]
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(QuarterCalendar::default(), EmissionPolicy::default())
    }

    fn constrained(helper: &str) -> WideRow {
        WideRow::new(helper)
            .customer("Acme")
            .sku("SKU1")
            .product_type("Chargers")
            .unit_price("$10.00")
    }

    #[test]
    fn emits_constrained_then_unconstrained() {
        let rows = vec![constrained("H1").week(202534, "$100.00")];
        let lookup = build_lookup(
            &[WideRow::new("H1").unit_price("$10.00").week(202534, "$150.00")],
            &weeks(),
        );

        let r = reconciler();
        let out: Vec<_> = r.reconcile(&rows, &lookup, &weeks()).collect();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].forecast_type, ForecastType::Constrained);
        assert_eq!(out[0].forecast_units, dec!(10));
        assert_eq!(out[0].delta_units, dec!(-5));
        assert_eq!(out[0].delta_revenue, dec!(-50));
        assert_eq!(out[0].gap_flag, GapFlag::SupplyGap);
        assert_eq!(out[0].quarter, "Q3 2025");
        assert!(!out[0].is_current_quarter);

        assert_eq!(out[1].forecast_type, ForecastType::Unconstrained);
        assert_eq!(out[1].forecast_units, dec!(15));
        assert_eq!(out[1].forecast_revenue, dec!(150));
        assert_eq!(out[1].delta_units, Decimal::ZERO);
        assert_eq!(out[1].delta_revenue, Decimal::ZERO);
        assert_eq!(out[1].gap_flag, GapFlag::None);
    }

    #[test]
    fn current_quarter_flag_follows_calendar() {
        let rows = vec![constrained("H1").week(202540, 50.0)];
        let lookup = UnconstrainedLookup::default();
        let r = reconciler();
        let out: Vec<_> = r.reconcile(&rows, &lookup, &weeks()).collect();
        assert_eq!(out[0].quarter, "Q4 2025");
        assert!(out[0].is_current_quarter);
        assert!(out[1].is_current_quarter);
    }

    #[test]
    fn gap_flag_uses_units_not_revenue() {
        // Revenue goes up while units go down because of a higher price
        let rows = vec![constrained("H1").unit_price(20.0).week(202534, 160.0)];
        let lookup = build_lookup(
            &[WideRow::new("H1").unit_price(10.0).week(202534, 100.0)],
            &weeks(),
        );
        let r = reconciler();
        let out: Vec<_> = r.reconcile(&rows, &lookup, &weeks()).collect();
        assert_eq!(out[0].delta_revenue, dec!(60));
        assert_eq!(out[0].delta_units, dec!(-2));
        assert_eq!(out[0].gap_flag, GapFlag::SupplyGap);
    }

    #[test]
    fn price_issue_rows_get_zero_units() {
        let rows = vec![constrained("H1").unit_price("#N/A").week(202534, 100.0)];
        let lookup = UnconstrainedLookup::default();
        let r = reconciler();
        let weeks = weeks();
        let mut stream = r.reconcile(&rows, &lookup, &weeks);
        let out: Vec<_> = stream.by_ref().collect();

        assert_eq!(out[0].forecast_units, Decimal::ZERO);
        assert_eq!(out[0].data_quality, Some(DataQuality::PriceIssue));
        assert_eq!(out[1].data_quality, Some(DataQuality::PriceIssue));
        assert_eq!(stream.stats().price_issue_rows, 1);
    }

    #[test]
    fn data_quality_can_be_disabled() {
        let rows = vec![constrained("H1").week(202534, 100.0)];
        let lookup = UnconstrainedLookup::default();
        let r = reconciler().data_quality(false);
        assert!(r.reconcile(&rows, &lookup, &weeks()).all(|rec| rec.data_quality.is_none()));
    }

    #[test]
    fn unconstrained_price_falls_back_to_row_price() {
        let rows = vec![constrained("H1").week(202534, 100.0).week(202540, 100.0)];
        let lookup = build_lookup(
            &[WideRow::new("H1").unit_price(12.0).week(202534, 120.0)],
            &weeks()[..1],
        );
        let r = reconciler();
        let out: Vec<_> = r.reconcile(&rows, &lookup, &weeks()).collect();
        assert_eq!(out[1].unit_price, dec!(12));
        // No lookup entry for the second week
        assert_eq!(out[3].unit_price, dec!(10));
    }

    #[test]
    fn counts_skips_and_suppressions() {
        let rows = vec![
            constrained("H1").week(202534, 100.0),
            constrained("H2").customer(""),
            WideRow::new("").customer("Acme").sku("SKU1"),
        ];
        let lookup = UnconstrainedLookup::default();
        let r = reconciler();
        let weeks = weeks();
        let mut stream = r.reconcile(&rows, &lookup, &weeks);
        assert_eq!(stream.by_ref().count(), 2);
        assert_eq!(
            stream.stats(),
            &ReconcileStats {
                rows_seen: 3,
                rows_processed: 1,
                rows_skipped: 2,
                price_issue_rows: 0,
                pairs_emitted: 1,
                pairs_suppressed: 1,
            }
        );
    }

    #[test]
    fn policy_changes_emission() {
        let rows = vec![constrained("H1").week(202534, -5.0)];
        let lookup = UnconstrainedLookup::default();

        let strict = Reconciler::new(QuarterCalendar::default(), EmissionPolicy::AnyRevenue);
        assert_eq!(strict.reconcile(&rows, &lookup, &weeks()).count(), 0);

        let current = reconciler();
        assert_eq!(current.reconcile(&rows, &lookup, &weeks()).count(), 2);
    }
}
