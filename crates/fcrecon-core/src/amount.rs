//! Permissive currency parsing
//!
//! Source sheets mix native numbers, currency-formatted strings and error
//! sentinels in the same column. [`parse_amount`] is total over every
//! [`CellValue`]: anything that is not a usable number becomes zero.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::table::CellValue;

/// Spreadsheet error values and placeholders that mean "no amount"
pub const ERROR_SENTINELS: &[&str] = &["#N/A", "N/A", "#DIV/0!"];

/// Longest leading numeral; trailing units or codes are ignored
static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("amount pattern is valid")
});

/// Parse a cell into a definite decimal amount, falling back to zero.
///
/// - `Empty` and error sentinels give zero
/// - text is stripped of `$`, `,`, `"` and whitespace, then its leading
///   numeral is parsed (`"12.50USD"` is 12.5, `"abc12"` is zero)
/// - non-finite numbers give zero
pub fn parse_amount(value: &CellValue) -> Decimal {
    match value {
        CellValue::Number(n) => decimal_from_f64(*n),
        CellValue::Numeral(s) | CellValue::Text(s) => parse_amount_str(s),
        CellValue::Empty => Decimal::ZERO,
    }
}

/// Parse currency text such as `"$5,460.00"`
pub fn parse_amount_str(raw: &str) -> Decimal {
    if is_sentinel(raw.trim()) {
        return Decimal::ZERO;
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '"') && !c.is_whitespace())
        .collect();

    if is_sentinel(&cleaned) {
        return Decimal::ZERO;
    }
    let Some(numeral) = LEADING_NUMBER.find(&cleaned).map(|m| m.as_str()) else {
        return Decimal::ZERO;
    };

    Decimal::from_str(numeral)
        .or_else(|_| Decimal::from_scientific(numeral))
        .ok()
        .or_else(|| numeral.parse::<f64>().ok().map(decimal_from_f64))
        .unwrap_or(Decimal::ZERO)
}

fn is_sentinel(s: &str) -> bool {
    ERROR_SENTINELS.contains(&s)
}

fn decimal_from_f64(n: f64) -> Decimal {
    if n.is_finite() {
        Decimal::from_f64(n).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// `revenue / unit_price`, or zero when the price is not positive
pub fn units_from_revenue(revenue: Decimal, unit_price: Decimal) -> Decimal {
    if unit_price > Decimal::ZERO {
        revenue.checked_div(unit_price).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}
