#![deny(warnings)]

//! Presentation helpers: formatted table rows, a plain-text media plan table
//! and the dual-axis chart series (impressions on the left axis, clicks on
//! the right).

use plan_core::MetricRow;
use plan_engine::PlanTotals;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Table header, in display order.
pub const COLUMNS: [&str; 10] = [
    "Channel",
    "Impressions",
    "Clicks",
    "CTR",
    "CPC",
    "CPM",
    "Conversions",
    "Conv. Rate",
    "Cost",
    "Cost/Conv.",
];

fn round_to(value: f64, dp: u32) -> Decimal {
    let mut d = Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    d.rescale(dp);
    if d.is_zero() {
        d.set_sign_positive(true);
    }
    d
}

// "-1234567.89" -> "-1,234,567.89"
fn group_thousands(s: &str) -> String {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(r) => ("-", r),
        None => ("", s),
    };
    let (int, frac) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Whole number with thousands separators, e.g. `5,000`.
pub fn format_count(value: f64) -> String {
    group_thousands(&round_to(value, 0).to_string())
}

/// Two decimals with thousands separators, e.g. `1,234.50`.
pub fn format_decimal(value: f64) -> String {
    group_thousands(&round_to(value, 2).to_string())
}

/// Currency, e.g. `$1,234.50`.
pub fn format_money(value: f64) -> String {
    let s = format_decimal(value);
    match s.strip_prefix('-') {
        Some(abs) => format!("-${abs}"),
        None => format!("${s}"),
    }
}

/// Percentage value already expressed in percent, e.g. `2.50%`.
pub fn format_percent(value: f64) -> String {
    format!("{}%", round_to(value, 2))
}

/// One formatted line of the media plan table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub channel: String,
    pub impressions: String,
    pub clicks: String,
    pub ctr: String,
    pub cpc: String,
    pub cpm: String,
    pub conversions: String,
    pub conv_rate: String,
    pub cost: String,
    pub cost_per_conversion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl TableRow {
    pub fn from_metric(m: &MetricRow) -> Self {
        Self {
            channel: m.channel.0.clone(),
            impressions: format_count(m.impressions),
            clicks: format_count(m.clicks),
            ctr: format_percent(m.ctr_pct),
            cpc: format_money(m.cpc),
            cpm: format_money(m.cpm),
            conversions: format_decimal(m.conversions),
            conv_rate: format_percent(m.conv_rate_pct),
            cost: format_money(m.cost),
            cost_per_conversion: format_money(m.cost_per_conversion),
            warning: m.degeneracy.map(|d| d.to_string()),
        }
    }

    /// Totals line; rates are blended from the summed funnel.
    pub fn from_totals(t: &PlanTotals) -> Self {
        let rate = |num: f64, den: f64| if den > 0.0 { num / den * 100.0 } else { 0.0 };
        Self {
            channel: "Total".to_string(),
            impressions: format_count(t.impressions),
            clicks: format_count(t.clicks),
            ctr: format_percent(rate(t.clicks, t.impressions)),
            cpc: format_money(t.blended_cpc),
            cpm: format_money(t.blended_cpm),
            conversions: format_decimal(t.conversions),
            conv_rate: format_percent(rate(t.conversions, t.clicks)),
            cost: format_money(t.cost),
            cost_per_conversion: format_money(t.cost_per_conversion),
            warning: None,
        }
    }

    fn cells(&self) -> [String; 10] {
        let channel = if self.warning.is_some() {
            format!("{} *", self.channel)
        } else {
            self.channel.clone()
        };
        [
            channel,
            self.impressions.clone(),
            self.clicks.clone(),
            self.ctr.clone(),
            self.cpc.clone(),
            self.cpm.clone(),
            self.conversions.clone(),
            self.conv_rate.clone(),
            self.cost.clone(),
            self.cost_per_conversion.clone(),
        ]
    }
}

/// Render the plan as an aligned text table followed by a totals line,
/// an allocation summary and footnotes for flagged rows.
pub fn render_table(rows: &[MetricRow], totals: &PlanTotals) -> String {
    let table: Vec<TableRow> = rows.iter().map(TableRow::from_metric).collect();
    let mut lines: Vec<[String; 10]> = Vec::with_capacity(table.len() + 2);
    lines.push(COLUMNS.map(String::from));
    lines.extend(table.iter().map(TableRow::cells));
    lines.push(TableRow::from_totals(totals).cells());

    let mut widths = [0usize; 10];
    for line in &lines {
        for (w, cell) in widths.iter_mut().zip(line.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let fmt_line = |cells: &[String; 10]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (c, &w))| {
                if i == 0 {
                    format!("{c:<w$}")
                } else {
                    format!("{c:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");

    let mut out = String::new();
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        if i == 1 || i == last {
            out.push_str(&rule);
            out.push('\n');
        }
        out.push_str(&fmt_line(line));
        out.push('\n');
    }

    out.push_str(&format!(
        "Allocated {} of {}",
        format_percent(totals.allocated_pct),
        format_money(totals.budget)
    ));
    if totals.over_allocated {
        out.push_str(&format!(
            " (over-allocated by {})",
            format_money(-totals.unallocated)
        ));
    } else {
        out.push_str(&format!(" ({} unallocated)", format_money(totals.unallocated)));
    }
    out.push('\n');

    for row in &table {
        if let Some(w) = &row.warning {
            out.push_str(&format!("* {}: {}\n", row.channel, w));
        }
    }
    out
}

/// One bar series of the chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub y_axis_id: String,
}

/// Axis placement of a chart series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAxis {
    pub id: String,
    pub position: String,
}

/// Dual-axis bar chart keyed by channel label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    pub axes: Vec<ChartAxis>,
}

impl ChartData {
    pub fn from_rows(rows: &[MetricRow]) -> Self {
        Self {
            labels: rows.iter().map(|r| r.channel.0.clone()).collect(),
            datasets: vec![
                ChartDataset {
                    label: "Impressions".to_string(),
                    data: rows.iter().map(|r| r.impressions).collect(),
                    y_axis_id: "y".to_string(),
                },
                ChartDataset {
                    label: "Clicks".to_string(),
                    data: rows.iter().map(|r| r.clicks).collect(),
                    y_axis_id: "y1".to_string(),
                },
            ],
            axes: vec![
                ChartAxis {
                    id: "y".to_string(),
                    position: "left".to_string(),
                },
                ChartAxis {
                    id: "y1".to_string(),
                    position: "right".to_string(),
                },
            ],
        }
    }
}

/// Machine-readable snapshot of a rendered plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub industry: String,
    pub budget: f64,
    pub table: Vec<TableRow>,
    pub totals: PlanTotals,
    pub chart: ChartData,
}

impl PlanReport {
    pub fn new(industry: &str, budget: f64, rows: &[MetricRow], totals: &PlanTotals) -> Self {
        Self {
            industry: industry.to_string(),
            budget,
            table: rows.iter().map(TableRow::from_metric).collect(),
            totals: totals.clone(),
            chart: ChartData::from_rows(rows),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::DivisionDegeneracy;
    use proptest::prelude::*;

    fn metric(channel: &str) -> MetricRow {
        MetricRow {
            channel: channel.into(),
            impressions: 5000.0,
            clicks: 250.0,
            ctr_pct: 5.0,
            cpc: 2.0,
            cpm: 100.0,
            conversions: 25.0,
            conv_rate_pct: 10.0,
            cost: 500.0,
            cost_per_conversion: 20.0,
            degeneracy: None,
        }
    }

    fn totals() -> PlanTotals {
        PlanTotals {
            budget: 1000.0,
            cost: 500.0,
            impressions: 5000.0,
            clicks: 250.0,
            conversions: 25.0,
            allocated_pct: 50.0,
            unallocated: 500.0,
            over_allocated: false,
            blended_cpc: 2.0,
            blended_cpm: 100.0,
            cost_per_conversion: 20.0,
        }
    }

    #[test]
    fn number_formats() {
        assert_eq!(format_count(5000.0), "5,000");
        assert_eq!(format_count(1234567.5), "1,234,568");
        assert_eq!(format_count(999.4), "999");
        assert_eq!(format_money(500.0), "$500.00");
        assert_eq!(format_money(1234567.891), "$1,234,567.89");
        assert_eq!(format_money(0.005), "$0.01");
        assert_eq!(format_money(-100.0), "-$100.00");
        assert_eq!(format_money(-0.0), "$0.00");
        assert_eq!(format_percent(2.5), "2.50%");
        assert_eq!(format_decimal(25.0), "25.00");
    }

    #[test]
    fn table_row_from_reference_metric() {
        let r = TableRow::from_metric(&metric("Search"));
        assert_eq!(r.channel, "Search");
        assert_eq!(r.impressions, "5,000");
        assert_eq!(r.clicks, "250");
        assert_eq!(r.ctr, "5.00%");
        assert_eq!(r.cpc, "$2.00");
        assert_eq!(r.cpm, "$100.00");
        assert_eq!(r.conversions, "25.00");
        assert_eq!(r.conv_rate, "10.00%");
        assert_eq!(r.cost, "$500.00");
        assert_eq!(r.cost_per_conversion, "$20.00");
        assert!(r.warning.is_none());
    }

    #[test]
    fn totals_row_blends_rates() {
        let r = TableRow::from_totals(&totals());
        assert_eq!(r.channel, "Total");
        assert_eq!(r.ctr, "5.00%");
        assert_eq!(r.conv_rate, "10.00%");
        assert_eq!(r.cost, "$500.00");
    }

    #[test]
    fn text_table_has_header_rows_and_summary() {
        let out = render_table(&[metric("Search")], &totals());
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Channel"));
        assert!(lines[0].contains("Cost/Conv."));
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].starts_with("Search"));
        assert!(lines[2].ends_with("$20.00"));
        assert!(lines[4].starts_with("Total"));
        assert_eq!(lines[5], "Allocated 50.00% of $1,000.00 ($500.00 unallocated)");
    }

    #[test]
    fn empty_plan_renders_without_rows() {
        let out = render_table(&[], &PlanTotals::default());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].starts_with("Total"));
        let chart = ChartData::from_rows(&[]);
        assert!(chart.labels.is_empty());
        assert!(chart.datasets.iter().all(|d| d.data.is_empty()));
    }

    #[test]
    fn flagged_row_gets_marker_and_footnote() {
        let mut m = metric("Video");
        m.degeneracy = Some(DivisionDegeneracy::ZeroCpc);
        let out = render_table(&[m], &totals());
        assert!(out.contains("Video *"));
        assert!(out.contains("* Video: cost per click is zero"));
    }

    #[test]
    fn over_allocation_is_reported() {
        let mut t = totals();
        t.allocated_pct = 120.0;
        t.over_allocated = true;
        t.unallocated = -200.0;
        let out = render_table(&[], &t);
        assert!(out.contains("Allocated 120.00% of $1,000.00 (over-allocated by $200.00)"));
    }

    #[test]
    fn chart_json_uses_dual_axes() {
        let report = PlanReport::new("Retail", 1000.0, &[metric("Search")], &totals());
        let json = report.to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["chart"]["labels"][0], "Search");
        assert_eq!(v["chart"]["datasets"][0]["yAxisId"], "y");
        assert_eq!(v["chart"]["datasets"][1]["label"], "Clicks");
        assert_eq!(v["chart"]["datasets"][1]["yAxisId"], "y1");
        assert_eq!(v["chart"]["axes"][1]["position"], "right");
        assert_eq!(v["table"][0]["cost"], "$500.00");
    }

    proptest! {
        #[test]
        fn grouping_preserves_digits(n in 0u64..10_000_000_000) {
            let s = format_count(n as f64);
            prop_assert_eq!(s.replace(',', ""), n.to_string());
            for group in s.split(',').skip(1) {
                prop_assert_eq!(group.len(), 3);
            }
        }
    }
}
