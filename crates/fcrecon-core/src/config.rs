//! Run configuration
//!
//! Loaded from TOML. Every section is optional; omitted sections take the
//! defaults below.
//!
//! ```toml
//! [calendar]
//! current_quarter = "Q4 2025"
//!
//! [[calendar.quarters]]
//! label = "Q4 2025"
//! start = 202540
//! end = 202552
//!
//! [emission]
//! policy = "revenue_or_delta"
//! threshold = "0.01"
//!
//! [batch]
//! size = 500
//! max_attempts = 3
//! ```

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quarter::QuarterCalendar;
use crate::table::ColumnLayout;
use crate::week::WeekId;
use crate::{ConfigError, OutputSchema};

/// Complete configuration for one reconciliation run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub calendar: QuarterCalendar,
    pub layout: ColumnLayout,
    pub emission: EmissionPolicy,
    pub batch: BatchConfig,
    pub output: OutputConfig,
    pub validation: ValidationConfig,
}

impl ReconcileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calendar.validate()?;
        if self.batch.size == 0 {
            return Err(ConfigError::Invalid("batch.size must be at least 1".into()));
        }
        if self.batch.max_attempts == 0 {
            return Err(ConfigError::Invalid("batch.max_attempts must be at least 1".into()));
        }
        if let EmissionPolicy::RevenueOrDelta { threshold } = &self.emission {
            if threshold.is_sign_negative() {
                return Err(ConfigError::Invalid(format!(
                    "emission threshold must not be negative (got {threshold})"
                )));
            }
        }
        Ok(())
    }

    /// Output columns implied by the layout and output switches
    pub fn output_schema(&self) -> OutputSchema {
        OutputSchema {
            customer_id: self.output.customer_id && self.layout.customer_id.is_some(),
            data_quality: self.output.data_quality,
        }
    }
}

// ============================================================================
// Emission policy
// ============================================================================

/// Values the emission filter decides on, per (row, week)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmissionCandidate {
    pub constrained_revenue: Decimal,
    pub unconstrained_revenue: Decimal,
    pub delta_units: Decimal,
    pub delta_revenue: Decimal,
}

/// Predicate signature for [`EmissionPolicy::Custom`]
pub type EmissionPredicate = Arc<dyn Fn(&EmissionCandidate) -> bool + Send + Sync>;

/// Decides whether a (row, week) pair produces output records
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// Either side has positive revenue
    AnyRevenue,
    /// Either side has positive revenue, or `|delta revenue| > threshold`
    RevenueOrDelta { threshold: Decimal },
    /// Caller-supplied predicate; not expressible in TOML
    #[serde(skip)]
    Custom { predicate: EmissionPredicate },
}

impl Default for EmissionPolicy {
    fn default() -> Self {
        Self::RevenueOrDelta {
            threshold: Decimal::new(1, 2),
        }
    }
}

impl EmissionPolicy {
    pub fn custom(predicate: impl Fn(&EmissionCandidate) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom {
            predicate: Arc::new(predicate),
        }
    }

    pub fn should_emit(&self, c: &EmissionCandidate) -> bool {
        let any_revenue =
            c.constrained_revenue > Decimal::ZERO || c.unconstrained_revenue > Decimal::ZERO;
        match self {
            Self::AnyRevenue => any_revenue,
            Self::RevenueOrDelta { threshold } => any_revenue || c.delta_revenue.abs() > *threshold,
            Self::Custom { predicate } => predicate(c),
        }
    }
}

impl fmt::Debug for EmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyRevenue => f.write_str("AnyRevenue"),
            Self::RevenueOrDelta { threshold } => f
                .debug_struct("RevenueOrDelta")
                .field("threshold", threshold)
                .finish(),
            Self::Custom { .. } => f.write_str("Custom(..)"),
        }
    }
}

// ============================================================================
// Other sections
// ============================================================================

/// Destination write behaviour
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Output records per flush
    pub size: usize,
    /// Attempts per batch before the run fails
    pub max_attempts: u32,
    /// Pause between batches, for rate-limited destinations
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 500,
            max_attempts: 3,
            pause_ms: 0,
        }
    }
}

/// Optional output columns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_quality: bool,
    /// Only has an effect when the layout has a customer id column
    pub customer_id: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_quality: true,
            customer_id: true,
        }
    }
}

/// Source freshness guard, checked against the constrained header
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required_weeks: Vec<WeekId>,
    pub rejected_weeks: Vec<WeekId>,
}
