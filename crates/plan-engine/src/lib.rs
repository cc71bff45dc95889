#![deny(warnings)]

//! Allocation engine: turns a budget and per-channel percentage allocations
//! into projected funnel metrics.
//!
//! The engine is stateless. For each included channel:
//! - cost = percentage/100 * budget
//! - clicks = cost / CPC
//! - impressions = cost / (CPC * CTR), so the funnel stays consistent with cost
//! - conversions = clicks * ConvRate
//!
//! Division by a zero CPC or CTR never produces non-finite output: the affected
//! metrics are clamped to 0 and the row carries a [`DivisionDegeneracy`] flag.

use plan_core::{
    BenchmarkRow, ChannelSelection, DivisionDegeneracy, IndustryId, MetricRow, SelectionMap,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregate view over the computed rows of one plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanTotals {
    pub budget: f64,
    pub cost: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    /// Sum of the included channels' effective percentages.
    pub allocated_pct: f64,
    /// Budget minus total cost; negative when over-allocated.
    pub unallocated: f64,
    pub over_allocated: bool,
    pub blended_cpc: f64,
    pub blended_cpm: f64,
    pub cost_per_conversion: f64,
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        finite_or_zero(num / den)
    } else {
        0.0
    }
}

/// Sanitize a budget: non-finite and negative budgets count as 0.
pub fn effective_budget(budget: f64) -> f64 {
    if budget.is_finite() && budget > 0.0 {
        budget
    } else {
        0.0
    }
}

/// Metrics for a single channel at the given allocation.
pub fn channel_metrics(budget: f64, percentage: f64, row: &BenchmarkRow) -> MetricRow {
    let budget = effective_budget(budget);
    let percentage = if percentage.is_finite() && percentage > 0.0 {
        percentage
    } else {
        0.0
    };
    let cpc = row.cpc;
    let ctr = row.ctr_pct / 100.0;
    let conv_rate = row.conv_rate_pct / 100.0;

    let cost = finite_or_zero((percentage / 100.0) * budget);

    let degeneracy = if cpc <= 0.0 {
        Some(DivisionDegeneracy::ZeroCpc)
    } else if ctr <= 0.0 {
        Some(DivisionDegeneracy::ZeroCtr)
    } else {
        None
    };

    let clicks = ratio_or_zero(cost, cpc);
    let impressions = ratio_or_zero(cost, cpc * ctr);
    let cpm = ratio_or_zero(cost, impressions) * 1000.0;
    let conversions = finite_or_zero(clicks * conv_rate);
    let cost_per_conversion = ratio_or_zero(cost, conversions);

    if let Some(flag) = degeneracy {
        debug!(channel = %row.channel, ?flag, "degenerate benchmark; metrics clamped");
    }

    MetricRow {
        channel: row.channel.clone(),
        impressions,
        clicks,
        ctr_pct: row.ctr_pct,
        cpc,
        cpm,
        conversions,
        conv_rate_pct: row.conv_rate_pct,
        cost,
        cost_per_conversion,
        degeneracy,
    }
}

/// Compute metric rows for an industry.
///
/// `rows` are the industry's benchmarks in catalog order; the output follows
/// that order restricted to channels whose selection is included. Channels
/// with no stored selection are excluded.
pub fn compute<'a, I>(
    budget: f64,
    industry: &IndustryId,
    rows: I,
    selections: &SelectionMap,
) -> Vec<MetricRow>
where
    I: IntoIterator<Item = &'a BenchmarkRow>,
{
    let out: Vec<MetricRow> = rows
        .into_iter()
        .filter(|r| &r.industry == industry)
        .filter_map(|r| {
            selections
                .get(&r.channel)
                .filter(|s| s.included)
                .map(|s: &ChannelSelection| channel_metrics(budget, s.effective_percentage(), r))
        })
        .collect();
    debug!(%industry, budget, rows = out.len(), "plan recomputed");
    out
}

/// Totals over computed rows. `selections` supplies the allocated percentage.
pub fn summarize(budget: f64, rows: &[MetricRow], selections: &SelectionMap) -> PlanTotals {
    let budget = effective_budget(budget);
    let cost: f64 = rows.iter().map(|r| r.cost).sum();
    let impressions: f64 = rows.iter().map(|r| r.impressions).sum();
    let clicks: f64 = rows.iter().map(|r| r.clicks).sum();
    let conversions: f64 = rows.iter().map(|r| r.conversions).sum();
    let allocated_pct: f64 = rows
        .iter()
        .filter_map(|r| selections.get(&r.channel))
        .map(ChannelSelection::effective_percentage)
        .sum();
    PlanTotals {
        budget,
        cost,
        impressions,
        clicks,
        conversions,
        allocated_pct,
        unallocated: budget - cost,
        over_allocated: allocated_pct > 100.0,
        blended_cpc: ratio_or_zero(cost, clicks),
        blended_cpm: ratio_or_zero(cost, impressions) * 1000.0,
        cost_per_conversion: ratio_or_zero(cost, conversions),
    }
}
