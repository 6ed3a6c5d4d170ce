//! # fcrecon-engine
//!
//! Reconciliation engine: builds the unconstrained lookup, streams
//! reconciled records and writes them to a [`RecordSink`] in batches.
//!
//! ## Example
//!
//! ```rust
//! use fcrecon_core::{CellValue, MemorySink, ReconcileConfig, WideTable};
//! use fcrecon_engine::Pipeline;
//!
//! let header = ["Helper", "", "Price", "202534"].map(CellValue::from).to_vec();
//! let mut config = ReconcileConfig::default();
//! config.layout.customer_id = None;
//! config.layout.product_type = 1;
//! config.layout.customer = 1;
//! config.layout.sku = 0;
//! config.layout.week_start = 3;
//!
//! let constrained = WideTable::new(
//!     "constrained",
//!     header.clone(),
//!     vec![["H1", "Acme", "$10.00", "$100.00"].map(CellValue::from).to_vec()],
//! );
//! let unconstrained = WideTable::new(
//!     "unconstrained",
//!     header,
//!     vec![["H1", "Acme", "$10.00", "$150.00"].map(CellValue::from).to_vec()],
//! );
//!
//! let mut sink = MemorySink::new();
//! let report = Pipeline::new(config).run(&constrained, &unconstrained, &mut sink).unwrap();
//! assert_eq!(report.records_written, 2);
//! assert_eq!(sink.records[0].gap_flag.as_str(), "Supply Gap");
//! ```

pub mod batch;
pub mod lookup;
pub mod reconcile;

pub use batch::{BatchOutcome, BatchWriter, CancelToken};
pub use lookup::{build_lookup, LookupEntry, LookupStats, UnconstrainedLookup};
pub use reconcile::{ReconcileStats, Reconciler, RecordStream};

use chrono::{DateTime, Utc};
use fcrecon_core::{
    align_week_columns, find_week_columns, verify_freshness, EmissionPolicy, GapSummary,
    GapSummaryBuilder, ReconcileConfig, ReconcileError, RecordSink, WeekColumn, WeekId, WideRow,
    WideTable,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything a caller needs to report on a finished run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub constrained_table: String,
    pub unconstrained_table: String,
    pub records_written: usize,
    pub batches: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub week_columns: Vec<WeekColumn>,
    /// Constrained weeks missing from the unconstrained header
    pub unmatched_weeks: Vec<WeekId>,
    pub lookup: LookupStats,
    pub duplicate_sample: Vec<String>,
    pub reconcile: ReconcileStats,
    pub summary: GapSummary,
}

/// Week columns located in both tables, checked before any output is written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeekPlan {
    pub constrained: Vec<WeekColumn>,
    pub unconstrained: Vec<WeekColumn>,
}

impl WeekPlan {
    pub fn unmatched(&self) -> Vec<WeekId> {
        self.constrained
            .iter()
            .filter(|w| !self.unconstrained.iter().any(|u| u.week_id == w.week_id))
            .map(|w| w.week_id)
            .collect()
    }
}

/// One reconciliation run, from source tables to sink
pub struct Pipeline {
    config: ReconcileConfig,
    cancel: Option<CancelToken>,
}

impl Pipeline {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Override the configured emission policy
    pub fn with_policy(mut self, policy: EmissionPolicy) -> Self {
        self.config.emission = policy;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Locate and validate week columns in the constrained header
    pub fn check(&self, constrained: &WideTable) -> Result<Vec<WeekColumn>, ReconcileError> {
        require_table(constrained)?;
        let weeks = find_week_columns(&constrained.header, self.config.layout.week_start)?;
        verify_freshness(
            &weeks,
            &self.config.validation.required_weeks,
            &self.config.validation.rejected_weeks,
        )?;
        Ok(weeks)
    }

    /// Resolve week columns for both tables
    pub fn plan(
        &self,
        constrained: &WideTable,
        unconstrained: &WideTable,
    ) -> Result<WeekPlan, ReconcileError> {
        let weeks = self.check(constrained)?;
        require_table(unconstrained)?;
        let aligned =
            align_week_columns(&weeks, &unconstrained.header, self.config.layout.week_start);
        Ok(WeekPlan {
            constrained: weeks,
            unconstrained: aligned,
        })
    }

    /// Run the whole reconciliation and write the output to `sink`.
    ///
    /// Structural failures are returned before `sink.begin` is called.
    pub fn run<S>(
        &self,
        constrained: &WideTable,
        unconstrained: &WideTable,
        sink: &mut S,
    ) -> Result<RunReport, ReconcileError>
    where
        S: RecordSink + ?Sized,
    {
        let started_at = Utc::now();
        self.config.validate()?;
        if !self.config.calendar.has_current_range() {
            warn!(
                current = %self.config.calendar.current_quarter,
                "current quarter does not match any configured range"
            );
        }
        for (first, second) in self.config.calendar.overlapping() {
            warn!(first, second, "quarter ranges overlap; the earlier range wins");
        }

        let plan = self.plan(constrained, unconstrained)?;
        let unmatched = plan.unmatched();
        info!(
            constrained = %constrained.name,
            weeks = plan.constrained.len(),
            first = plan.constrained.first().map(|w| w.week_id),
            last = plan.constrained.last().map(|w| w.week_id),
            "located week columns"
        );
        if !unmatched.is_empty() {
            warn!(
                unconstrained = %unconstrained.name,
                missing = unmatched.len(),
                "weeks missing from unconstrained header: {:?}",
                unmatched
            );
        }

        let layout = &self.config.layout;
        let lookup = build_lookup(
            unconstrained.wide_rows(layout, &plan.unconstrained),
            &plan.unconstrained,
        );
        let stats = lookup.stats();
        info!(
            entries = stats.entries,
            rows = stats.rows,
            invalid_prices = stats.invalid_prices,
            nonzero = stats.nonzero_forecasts,
            "built unconstrained lookup"
        );
        if stats.duplicate_keys > 0 {
            warn!(
                duplicates = stats.duplicate_keys,
                sample = ?lookup.duplicate_sample(),
                "duplicate helper key/week pairs in unconstrained table; last row wins"
            );
        }

        let rows: Vec<WideRow> = constrained.wide_rows(layout, &plan.constrained).collect();
        let reconciler = Reconciler::from_config(&self.config);
        let mut stream = reconciler.reconcile(&rows, &lookup, &plan.constrained);

        let mut writer = BatchWriter::new(&self.config.batch);
        if let Some(token) = &self.cancel {
            writer = writer.with_cancel_token(token.clone());
        }

        let mut summary = GapSummaryBuilder::new();
        sink.begin(&self.config.output_schema())?;
        let outcome = writer.write_batches(sink, stream.by_ref(), |batch| {
            batch.iter().for_each(|r| summary.observe(r));
        })?;
        let summary = summary.finish();
        sink.finish(&summary)?;

        let reconcile_stats = stream.stats().clone();
        info!(
            written = outcome.written,
            batches = outcome.batches,
            skipped_rows = reconcile_stats.rows_skipped,
            gaps = summary.totals.supply_gap_records,
            cancelled = outcome.cancelled,
            "reconciliation finished"
        );

        Ok(RunReport {
            constrained_table: constrained.name.clone(),
            unconstrained_table: unconstrained.name.clone(),
            records_written: outcome.written,
            batches: outcome.batches,
            cancelled: outcome.cancelled,
            started_at,
            finished_at: Utc::now(),
            week_columns: plan.constrained,
            unmatched_weeks: unmatched,
            lookup: lookup.stats().clone(),
            duplicate_sample: lookup.duplicate_sample().to_vec(),
            reconcile: reconcile_stats,
            summary,
        })
    }
}

fn require_table(table: &WideTable) -> Result<(), ReconcileError> {
    if table.header.iter().all(|c| c.is_blank()) {
        return Err(ReconcileError::MissingTable(table.name.clone()));
    }
    Ok(())
}
