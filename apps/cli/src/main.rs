#![deny(warnings)]

//! Headless media planner: loads benchmarks, replays a scenario of planner
//! events and prints the resulting plan.

use anyhow::{bail, Context, Result};
use plan_catalog::LoadError;
use plan_core::IndustryId;
use plan_report::{format_money, format_percent, render_table, PlanReport};
use plan_session::{PlanView, PlannerEvent, PresentationSink, Session};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA: &str = "assets/benchmarks.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, PartialEq)]
struct Args {
    data: PathBuf,
    budget: Option<String>,
    industry: Option<String>,
    scenario: Option<PathBuf>,
    format: OutputFormat,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args {
        data: PathBuf::from(DEFAULT_DATA),
        budget: None,
        industry: None,
        scenario: None,
        format: OutputFormat::Table,
    };
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data" => {
                if let Some(v) = it.next() {
                    parsed.data = PathBuf::from(v);
                }
            }
            "--budget" => parsed.budget = it.next(),
            "--industry" => parsed.industry = it.next(),
            "--scenario" => parsed.scenario = it.next().map(PathBuf::from),
            "--format" => {
                parsed.format = match it.next().as_deref() {
                    Some("json") => OutputFormat::Json,
                    Some("table") | None => OutputFormat::Table,
                    Some(other) => bail!("unknown output format {other:?}"),
                }
            }
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(parsed)
}

/// Scripted planner inputs.
#[derive(Debug, Default, Deserialize)]
struct Scenario {
    #[serde(default)]
    budget: Option<String>,
    #[serde(default)]
    industry: Option<IndustryId>,
    #[serde(default)]
    events: Vec<PlannerEvent>,
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
}

/// Flags override the scenario's initial budget and industry; scripted
/// events follow in order.
fn event_script(args: &Args, scenario: Scenario) -> Vec<PlannerEvent> {
    let mut events = Vec::with_capacity(scenario.events.len() + 2);
    if let Some(value) = args.budget.clone().or(scenario.budget) {
        events.push(PlannerEvent::BudgetChanged { value });
    }
    let industry = args
        .industry
        .as_deref()
        .map(IndustryId::from)
        .or(scenario.industry);
    if let Some(industry) = industry {
        events.push(PlannerEvent::IndustryChanged { industry });
    }
    events.extend(scenario.events);
    events
}

/// Keeps only the latest rendering, plus every notice seen along the way.
#[derive(Default)]
struct TerminalSink {
    last: Option<PlanView>,
    unavailable: Option<String>,
    notices: Vec<String>,
    renders: usize,
}

impl PresentationSink for TerminalSink {
    fn render(&mut self, view: &PlanView) {
        self.notices
            .extend(view.notices.iter().map(|n| n.to_string()));
        self.last = Some(view.clone());
        self.renders += 1;
    }

    fn render_unavailable(&mut self, error: &LoadError) {
        self.last = None;
        self.unavailable = Some(error.to_string());
    }
}

fn print_table(view: &PlanView) {
    println!(
        "Industry: {} | Budget: {}",
        view.industry,
        format_money(view.budget)
    );
    println!("Channels:");
    for c in &view.channels {
        let pct = c
            .percentage
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {} {} {}",
            if c.included { "x" } else { " " },
            c.channel,
            pct,
            format_money(c.cost)
        );
    }
    println!();
    print!("{}", render_table(&view.rows, &view.totals));
}

fn main() -> Result<()> {
    // Logging setup; stdout is reserved for the plan
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(data = %args.data.display(), scenario = ?args.scenario, "starting planner");

    let mut session = Session::new(TerminalSink::default());
    session.catalog_loaded(plan_catalog::load(&args.data));
    if let Some(err) = session.load_error() {
        bail!("benchmark data unavailable: {err}");
    }

    let scenario = match &args.scenario {
        Some(path) => load_scenario(path)?,
        None => Scenario::default(),
    };
    for event in event_script(&args, scenario) {
        session.dispatch(event);
    }

    let sink = session.into_sink();
    info!(renders = sink.renders, "plan computed");
    for n in &sink.notices {
        eprintln!("note: {n}");
    }
    let Some(view) = sink.last else {
        bail!(
            "no plan rendered: {}",
            sink.unavailable.unwrap_or_else(|| "catalog not loaded".into())
        );
    };
    match args.format {
        OutputFormat::Table => print_table(&view),
        OutputFormat::Json => {
            let report = PlanReport::new(&view.industry.0, view.budget, &view.rows, &view.totals);
            println!("{}", report.to_json()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    fn asset(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").join(rel)
    }

    #[test]
    fn parses_flags() {
        let a = args(&["--data", "x.csv", "--budget", "500", "--format", "json"]).unwrap();
        assert_eq!(a.data, PathBuf::from("x.csv"));
        assert_eq!(a.budget.as_deref(), Some("500"));
        assert_eq!(a.format, OutputFormat::Json);
        assert!(args(&["--format", "xml"]).is_err());
        assert!(args(&["--bogus"]).is_err());
        assert_eq!(args(&[]).unwrap().data, PathBuf::from(DEFAULT_DATA));
    }

    #[test]
    fn flags_override_scenario_start() {
        let a = args(&["--budget", "2000"]).unwrap();
        let s = Scenario {
            budget: Some("10".into()),
            industry: Some("Retail".into()),
            events: vec![PlannerEvent::ChannelToggled {
                channel: "Search".into(),
            }],
        };
        let events = event_script(&a, s);
        assert_eq!(
            events[0],
            PlannerEvent::BudgetChanged {
                value: "2000".into()
            }
        );
        assert_eq!(
            events[1],
            PlannerEvent::IndustryChanged {
                industry: "Retail".into()
            }
        );
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn demo_scenario_runs_end_to_end() {
        let a = args(&[]).unwrap();
        let scenario = load_scenario(&asset("assets/scenarios/demo.yaml")).unwrap();
        let mut session = Session::new(TerminalSink::default());
        session.catalog_loaded(plan_catalog::load(asset(DEFAULT_DATA)));
        assert!(session.is_ready());
        for e in event_script(&a, scenario) {
            assert!(session.dispatch(e));
        }
        let sink = session.into_sink();
        let view = sink.last.unwrap();
        assert!(!view.rows.is_empty());
        assert!(view.rows.iter().all(|r| r.cost.is_finite()));
        let report = PlanReport::new(&view.industry.0, view.budget, &view.rows, &view.totals);
        assert!(report.to_json().unwrap().contains("\"Impressions\""));
    }

    #[test]
    fn missing_data_is_unavailable() {
        let mut session = Session::new(TerminalSink::default());
        session.catalog_loaded(plan_catalog::load("/nonexistent.csv"));
        assert!(session.load_error().is_some());
        let sink = session.into_sink();
        assert!(sink.unavailable.is_some());
        assert!(sink.last.is_none());
    }
}
