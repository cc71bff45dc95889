#![deny(warnings)]

//! Core domain models and invariants for the media budget planner.
//!
//! This crate defines the types shared by the catalog, the allocation engine
//! and the session: benchmark rows, per-channel selections, derived metric
//! rows, plus validation and numeric coercion helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Industry name as it appears in the benchmark source, e.g. "Retail".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndustryId(pub String);

/// Channel name within an industry, e.g. "Search" or "Display".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl fmt::Display for IndustryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndustryId {
    fn from(s: &str) -> Self {
        IndustryId(s.to_string())
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

/// Historical benchmark for one channel of one industry. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    pub industry: IndustryId,
    pub channel: ChannelId,
    /// Cost per click in currency units (>= 0).
    pub cpc: f64,
    /// Click-through rate in percent, [0, 100].
    pub ctr_pct: f64,
    /// Conversion rate in percent, [0, 100].
    pub conv_rate_pct: f64,
}

impl BenchmarkRow {
    /// Identity key of the row.
    pub fn key(&self) -> (&IndustryId, &ChannelId) {
        (&self.industry, &self.channel)
    }
}

/// User input for one channel of one industry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub included: bool,
    /// `None` until the user enters a usable value.
    pub percentage: Option<f64>,
}

impl ChannelSelection {
    pub fn new(included: bool, percentage: Option<f64>) -> Self {
        Self {
            included,
            percentage,
        }
    }

    /// Percentage used by the engine: unset, non-finite or negative values count as 0.
    pub fn effective_percentage(&self) -> f64 {
        match self.percentage {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => 0.0,
        }
    }
}

/// Selections of a single industry keyed by channel.
pub type SelectionMap = BTreeMap<ChannelId, ChannelSelection>;

/// Why a metric row had some derived values clamped to zero.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivisionDegeneracy {
    /// Clicks, impressions and everything derived from them are clamped.
    #[error("cost per click is zero; clicks and impressions clamped to 0")]
    ZeroCpc,
    /// Impressions and CPM are clamped; clicks are still computed.
    #[error("click-through rate is zero; impressions clamped to 0")]
    ZeroCtr,
}

/// Projected performance of one included channel. Always finite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub channel: ChannelId,
    pub impressions: f64,
    pub clicks: f64,
    /// Benchmark click-through rate in percent.
    pub ctr_pct: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub conversions: f64,
    /// Benchmark conversion rate in percent.
    pub conv_rate_pct: f64,
    pub cost: f64,
    pub cost_per_conversion: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degeneracy: Option<DivisionDegeneracy>,
}

/// Numeric user input that a coercion applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputField {
    Budget,
    Percentage(ChannelId),
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputField::Budget => f.write_str("budget"),
            InputField::Percentage(ch) => write!(f, "percentage for {ch}"),
        }
    }
}

/// Non-fatal: a numeric input could not be used as entered and became 0.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{field} value {raw:?} is not a usable number; using 0")]
pub struct CoercionWarning {
    pub field: InputField,
    pub raw: String,
}

/// Parse a numeric field; surrounding whitespace is ignored.
///
/// Returns `None` for empty, unparsable or non-finite input.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a raw input to a non-negative number.
///
/// Empty input maps to 0 silently. Unparsable or negative input maps to 0 with
/// a warning.
pub fn coerce_non_negative(field: InputField, raw: &str) -> (f64, Option<CoercionWarning>) {
    if raw.trim().is_empty() {
        return (0.0, None);
    }
    match parse_number(raw) {
        Some(v) if v >= 0.0 => (v, None),
        _ => {
            debug!(%field, raw, "coercing numeric input to 0");
            (
                0.0,
                Some(CoercionWarning {
                    field,
                    raw: raw.to_string(),
                }),
            )
        }
    }
}

/// Coerce a raw budget input. Non-numeric and negative budgets become 0.
pub fn coerce_budget(raw: &str) -> (f64, Option<CoercionWarning>) {
    coerce_non_negative(InputField::Budget, raw)
}

/// Coerce a raw percentage input.
///
/// Unlike the budget, an empty field stays unset so the channel control can
/// show a blank field; the engine treats unset as 0.
pub fn coerce_percentage(
    channel: &ChannelId,
    raw: &str,
) -> (Option<f64>, Option<CoercionWarning>) {
    if raw.trim().is_empty() {
        return (None, None);
    }
    let (v, warning) = coerce_non_negative(InputField::Percentage(channel.clone()), raw);
    match warning {
        Some(w) => (None, Some(w)),
        None => (Some(v), None),
    }
}

/// Validation errors for benchmark invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Industry or channel name is blank.
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),
    /// Numeric field must be finite.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    /// Cost per click must be non-negative.
    #[error("cost per click must be >= 0, got {0}")]
    NegativeCpc(f64),
    /// Rates are percentages within [0, 100].
    #[error("{field} must be within [0,100], got {value}")]
    RateOutOfRange { field: &'static str, value: f64 },
}

fn validate_rate(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::RateOutOfRange { field, value });
    }
    Ok(())
}

/// Validate a benchmark row. Zero CPC and zero CTR are allowed; the engine
/// flags them.
pub fn validate_benchmark_row(row: &BenchmarkRow) -> Result<(), ValidationError> {
    if row.industry.0.trim().is_empty() {
        return Err(ValidationError::EmptyName("industry"));
    }
    if row.channel.0.trim().is_empty() {
        return Err(ValidationError::EmptyName("channel"));
    }
    if !row.cpc.is_finite() {
        return Err(ValidationError::NonFinite("CPC"));
    }
    if row.cpc < 0.0 {
        return Err(ValidationError::NegativeCpc(row.cpc));
    }
    validate_rate("CTR", row.ctr_pct)?;
    validate_rate("ConvRate", row.conv_rate_pct)?;
    Ok(())
}
