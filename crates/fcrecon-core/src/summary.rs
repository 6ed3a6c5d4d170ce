//! Supply-gap summaries
//!
//! Aggregates the reconciled output into the tables the dashboard builder
//! consumes: gaps by SKU, by customer, by week and by product type, plus
//! headline totals. Only constrained records flagged as a supply gap feed
//! the aggregates; every record counts toward `total_records`.
//!
//! Gap units and revenue impact are reported as magnitudes.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::week::WeekId;
use crate::{ForecastType, ReconciledRecord};

// ============================================================================
// Summary tables
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GapTotals {
    pub total_records: usize,
    pub supply_gap_records: usize,
    /// Sum of |delta revenue| over gap records
    pub revenue_at_risk: Decimal,
    /// Sum of |delta units| over gap records
    pub units_at_risk: Decimal,
    pub skus_affected: usize,
    pub customers_affected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkuGap {
    pub rank: usize,
    pub sku: String,
    pub product_type: String,
    pub gap_units: Decimal,
    pub revenue_impact: Decimal,
    pub customers_affected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerGap {
    pub rank: usize,
    pub customer: String,
    pub gap_units: Decimal,
    pub revenue_impact: Decimal,
    pub skus_affected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekGap {
    pub week_id: WeekId,
    pub quarter: String,
    pub gap_units: Decimal,
    pub revenue_impact: Decimal,
    pub records: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductTypeGap {
    pub product_type: String,
    pub gap_units: Decimal,
    pub revenue_impact: Decimal,
    pub customers_affected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuarterGap {
    pub quarter: String,
    pub revenue_impact: Decimal,
}

/// All supply-gap aggregates for one run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub totals: GapTotals,
    pub by_sku: Vec<SkuGap>,
    pub by_customer: Vec<CustomerGap>,
    pub by_week: Vec<WeekGap>,
    pub by_product_type: Vec<ProductTypeGap>,
    pub by_quarter: Vec<QuarterGap>,
}

impl GapSummary {
    pub fn has_gaps(&self) -> bool {
        self.totals.supply_gap_records > 0
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Default)]
struct Acc {
    units: Decimal,
    revenue: Decimal,
    records: usize,
    members: BTreeSet<String>,
}

impl Acc {
    fn add(&mut self, record: &ReconciledRecord, member: &str) {
        self.units += record.delta_units;
        self.revenue += record.delta_revenue;
        self.records += 1;
        self.members.insert(member.to_string());
    }
}

/// Streaming accumulator; feed every emitted record to [`observe`](Self::observe)
#[derive(Default)]
pub struct GapSummaryBuilder {
    total_records: usize,
    gap_records: usize,
    revenue_at_risk: Decimal,
    units_at_risk: Decimal,
    skus: BTreeSet<String>,
    customers: BTreeSet<String>,
    by_sku: BTreeMap<(String, String), Acc>,
    by_customer: BTreeMap<String, Acc>,
    by_week: BTreeMap<(WeekId, String), Acc>,
    by_product_type: BTreeMap<String, Acc>,
    by_quarter: BTreeMap<String, Decimal>,
}

impl GapSummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &ReconciledRecord) {
        self.total_records += 1;
        if record.forecast_type != ForecastType::Constrained || !record.gap_flag.is_gap() {
            return;
        }

        self.gap_records += 1;
        self.revenue_at_risk += record.delta_revenue.abs();
        self.units_at_risk += record.delta_units.abs();
        self.skus.insert(record.sku.clone());
        self.customers.insert(record.customer.clone());

        self.by_sku
            .entry((record.sku.clone(), record.product_type.clone()))
            .or_default()
            .add(record, &record.customer);
        self.by_customer
            .entry(record.customer.clone())
            .or_default()
            .add(record, &record.sku);
        self.by_week
            .entry((record.week_id, record.quarter.clone()))
            .or_default()
            .add(record, &record.customer);
        self.by_product_type
            .entry(record.product_type.clone())
            .or_default()
            .add(record, &record.customer);
        *self.by_quarter.entry(record.quarter.clone()).or_default() += record.delta_revenue;
    }

    pub fn finish(self) -> GapSummary {
        let mut by_sku: Vec<SkuGap> = self
            .by_sku
            .into_iter()
            .map(|((sku, product_type), acc)| SkuGap {
                rank: 0,
                sku,
                product_type,
                gap_units: acc.units.abs(),
                revenue_impact: acc.revenue.abs(),
                customers_affected: acc.members.len(),
            })
            .collect();
        // Stable sort keeps key order among equal impacts
        by_sku.sort_by(|a, b| b.revenue_impact.cmp(&a.revenue_impact));
        for (i, row) in by_sku.iter_mut().enumerate() {
            row.rank = i + 1;
        }

        let mut by_customer: Vec<CustomerGap> = self
            .by_customer
            .into_iter()
            .map(|(customer, acc)| CustomerGap {
                rank: 0,
                customer,
                gap_units: acc.units.abs(),
                revenue_impact: acc.revenue.abs(),
                skus_affected: acc.members.len(),
            })
            .collect();
        by_customer.sort_by(|a, b| b.revenue_impact.cmp(&a.revenue_impact));
        for (i, row) in by_customer.iter_mut().enumerate() {
            row.rank = i + 1;
        }

        let by_week = self
            .by_week
            .into_iter()
            .map(|((week_id, quarter), acc)| WeekGap {
                week_id,
                quarter,
                gap_units: acc.units.abs(),
                revenue_impact: acc.revenue.abs(),
                records: acc.records,
            })
            .collect();

        let mut by_product_type: Vec<ProductTypeGap> = self
            .by_product_type
            .into_iter()
            .map(|(product_type, acc)| ProductTypeGap {
                product_type,
                gap_units: acc.units.abs(),
                revenue_impact: acc.revenue.abs(),
                customers_affected: acc.members.len(),
            })
            .collect();
        by_product_type.sort_by(|a, b| b.revenue_impact.cmp(&a.revenue_impact));

        let by_quarter = self
            .by_quarter
            .into_iter()
            .map(|(quarter, revenue)| QuarterGap {
                quarter,
                revenue_impact: revenue.abs(),
            })
            .collect();

        GapSummary {
            totals: GapTotals {
                total_records: self.total_records,
                supply_gap_records: self.gap_records,
                revenue_at_risk: self.revenue_at_risk,
                units_at_risk: self.units_at_risk,
                skus_affected: self.skus.len(),
                customers_affected: self.customers.len(),
            },
            by_sku,
            by_customer,
            by_week,
            by_product_type,
            by_quarter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GapFlag;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn gap(customer: &str, sku: &str, pdt: &str, week: WeekId, units: Decimal, revenue: Decimal) -> ReconciledRecord {
        ReconciledRecord {
            customer: customer.into(),
            customer_id: None,
            sku: sku.into(),
            product_type: pdt.into(),
            forecast_type: ForecastType::Constrained,
            quarter: "Q4 2025".into(),
            week_id: week,
            forecast_units: Decimal::ZERO,
            forecast_revenue: Decimal::ZERO,
            delta_units: units,
            delta_revenue: revenue,
            gap_flag: GapFlag::from_delta_units(units),
            is_current_quarter: true,
            helper_key: format!("{customer}-{sku}"),
            unit_price: dec!(10),
            data_quality: None,
        }
    }

    #[test]
    fn empty_summary() {
        let summary = GapSummaryBuilder::new().finish();
        assert_eq!(summary, GapSummary::default());
        assert!(!summary.has_gaps());
    }

    #[test]
    fn only_constrained_gap_records_aggregate() {
        let mut b = GapSummaryBuilder::new();
        b.observe(&gap("Acme", "SKU1", "Chargers", 202540, dec!(-5), dec!(-50)));
        // Not a gap
        b.observe(&gap("Acme", "SKU2", "Chargers", 202540, dec!(3), dec!(30)));
        // Baseline row never counts as a gap
        let mut baseline = gap("Acme", "SKU1", "Chargers", 202540, dec!(-5), dec!(-50));
        baseline.forecast_type = ForecastType::Unconstrained;
        b.observe(&baseline);

        let s = b.finish();
        assert_eq!(s.totals.total_records, 3);
        assert_eq!(s.totals.supply_gap_records, 1);
        assert_eq!(s.totals.revenue_at_risk, dec!(50));
        assert_eq!(s.totals.units_at_risk, dec!(5));
        assert_eq!(s.totals.skus_affected, 1);
        assert_eq!(s.by_sku.len(), 1);
    }

    #[test]
    fn rankings_sort_by_revenue_impact() {
        let mut b = GapSummaryBuilder::new();
        b.observe(&gap("Acme", "SKU1", "Chargers", 202540, dec!(-1), dec!(-10)));
        b.observe(&gap("Bolt", "SKU1", "Chargers", 202541, dec!(-2), dec!(-20)));
        b.observe(&gap("Bolt", "SKU2", "Cables", 202541, dec!(-10), dec!(-100)));

        let s = b.finish();

        assert_eq!(s.by_sku[0].sku, "SKU2");
        assert_eq!(s.by_sku[0].rank, 1);
        assert_eq!(s.by_sku[1].sku, "SKU1");
        assert_eq!(s.by_sku[1].revenue_impact, dec!(30));
        assert_eq!(s.by_sku[1].customers_affected, 2);

        assert_eq!(s.by_customer[0].customer, "Bolt");
        assert_eq!(s.by_customer[0].revenue_impact, dec!(120));
        assert_eq!(s.by_customer[0].skus_affected, 2);
        assert_eq!(s.by_customer[1].rank, 2);

        assert_eq!(s.by_week.len(), 2);
        assert_eq!(s.by_week[0].week_id, 202540);
        assert_eq!(s.by_week[1].records, 2);

        assert_eq!(s.by_product_type[0].product_type, "Cables");
        assert_eq!(s.by_quarter, vec![QuarterGap { quarter: "Q4 2025".into(), revenue_impact: dec!(130) }]);
        assert_eq!(s.totals.customers_affected, 2);
    }
}
