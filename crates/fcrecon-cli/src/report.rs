//! Terminal output for CLI commands
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success, including a cancelled run whose flushed rows are valid |
//! | 1 | Failure: structural error, bad configuration, or exhausted write retries |

use std::io::{self, Write};
use std::process;

use fcrecon_core::{QuarterCalendar, WeekColumn};
use fcrecon_engine::RunReport;
use fcrecon_render::format_decimal;

// ============================================================================
// Exit Code
// ============================================================================

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Reports
// ============================================================================

fn week_span(weeks: &[WeekColumn]) -> String {
    match (weeks.first(), weeks.last()) {
        (Some(first), Some(last)) => format!(
            "{} .. {} ({} columns)",
            first.week_id,
            last.week_id,
            weeks.len()
        ),
        _ => "none".into(),
    }
}

/// Weeks per quarter label, in first-seen order
pub fn quarter_buckets(weeks: &[WeekColumn], calendar: &QuarterCalendar) -> Vec<(String, usize)> {
    let mut buckets: Vec<(String, usize)> = Vec::new();
    for week in weeks {
        let label = calendar.classify(week.week_id);
        match buckets.iter_mut().find(|(l, _)| l == label) {
            Some((_, count)) => *count += 1,
            None => buckets.push((label.to_string(), 1)),
        }
    }
    buckets
}

/// Print the result of `check`
pub fn write_check<W: Write>(
    w: &mut W,
    table: &str,
    weeks: &[WeekColumn],
    calendar: &QuarterCalendar,
) -> io::Result<()> {
    writeln!(w, "Source:       {table}")?;
    writeln!(w, "Week columns: {}", week_span(weeks))?;
    for (label, count) in quarter_buckets(weeks, calendar) {
        let marker = if calendar.is_current(&label) { "  (current)" } else { "" };
        writeln!(w, "  {label:<10} {count:>3} weeks{marker}")?;
    }
    writeln!(w, "Freshness:    ok")?;
    Ok(())
}

/// Print the result of `reconcile`
pub fn write_run_report<W: Write>(w: &mut W, report: &RunReport, output: &str) -> io::Result<()> {
    let totals = &report.summary.totals;
    writeln!(
        w,
        "Reconciled '{}' against '{}'",
        report.constrained_table, report.unconstrained_table
    )?;
    writeln!(w, "  Weeks:           {}", week_span(&report.week_columns))?;
    if !report.unmatched_weeks.is_empty() {
        writeln!(
            w,
            "  Unmatched weeks: {} (no unconstrained column)",
            report.unmatched_weeks.len()
        )?;
    }
    writeln!(
        w,
        "  Rows:            {} processed, {} skipped, {} with price issues",
        report.reconcile.rows_processed,
        report.reconcile.rows_skipped,
        report.reconcile.price_issue_rows
    )?;
    if report.lookup.duplicate_keys > 0 {
        writeln!(
            w,
            "  Duplicate keys:  {} in unconstrained table",
            report.lookup.duplicate_keys
        )?;
    }
    writeln!(
        w,
        "  Records written: {} in {} batches",
        report.records_written, report.batches
    )?;
    if report.summary.has_gaps() {
        writeln!(
            w,
            "  Supply gaps:     {} records, revenue at risk {}, units at risk {}",
            totals.supply_gap_records,
            format_decimal(totals.revenue_at_risk),
            format_decimal(totals.units_at_risk)
        )?;
    } else {
        writeln!(w, "  Supply gaps:     none")?;
    }
    if report.cancelled {
        writeln!(w, "  Run cancelled; rows written so far are valid")?;
    }
    writeln!(w, "  Output:          {output}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Failure.code(), 1);
    }

    #[test]
    fn buckets_weeks_by_quarter() {
        let weeks: Vec<WeekColumn> = [202538, 202539, 202540, 202541, 202553]
            .iter()
            .enumerate()
            .map(|(i, &id)| WeekColumn::new(10 + i, id))
            .collect();
        let buckets = quarter_buckets(&weeks, &QuarterCalendar::default());
        assert_eq!(
            buckets,
            vec![
                ("Q3 2025".to_string(), 2),
                ("Q4 2025".to_string(), 2),
                ("Q1 2026".to_string(), 1),
            ]
        );
    }

    #[test]
    fn check_output_marks_current_quarter() {
        let weeks = vec![WeekColumn::new(10, 202540), WeekColumn::new(11, 202541)];
        let mut out = Vec::new();
        write_check(&mut out, "const", &weeks, &QuarterCalendar::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("202540 .. 202541 (2 columns)"));
        assert!(text.contains("Q4 2025      2 weeks  (current)"));
    }
}
