#![deny(warnings)]

//! Planner session: per-industry selection state, the closed set of input
//! events, a reducer over them, and the coordinator that recomputes the plan
//! and pushes it to a presentation sink.
//!
//! All state is owned by a single [`Session`]; every mutation goes through
//! `&mut self`, so reads and writes are serialized by construction.

use plan_catalog::{BenchmarkCatalog, LoadError};
use plan_core::{
    coerce_budget, coerce_percentage, ChannelId, ChannelSelection, CoercionWarning, IndustryId,
    MetricRow, SelectionMap,
};
use plan_engine::PlanTotals;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-industry channel selections, kept for the whole session.
///
/// Switching industries never drops another industry's entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionStore {
    industries: BTreeMap<IndustryId, SelectionMap>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapping for `industry` if none exists. Idempotent.
    pub fn ensure(&mut self, industry: &IndustryId) {
        self.industries.entry(industry.clone()).or_default();
    }

    /// Stored selection, if any. Callers treat absence as excluded at 0%.
    pub fn get(&self, industry: &IndustryId, channel: &ChannelId) -> Option<&ChannelSelection> {
        self.industries.get(industry).and_then(|m| m.get(channel))
    }

    /// Overwrite the selection of one channel.
    pub fn set(&mut self, industry: &IndustryId, channel: &ChannelId, selection: ChannelSelection) {
        self.industries
            .entry(industry.clone())
            .or_default()
            .insert(channel.clone(), selection);
    }

    pub fn selections_for(&self, industry: &IndustryId) -> Option<&SelectionMap> {
        self.industries.get(industry)
    }

    /// Flip inclusion, keeping the stored percentage. Returns the new state.
    pub fn toggle(&mut self, industry: &IndustryId, channel: &ChannelId) -> bool {
        let sel = self
            .industries
            .entry(industry.clone())
            .or_default()
            .entry(channel.clone())
            .or_default();
        sel.included = !sel.included;
        sel.included
    }

    /// Store a percentage without touching inclusion.
    pub fn set_percentage(
        &mut self,
        industry: &IndustryId,
        channel: &ChannelId,
        percentage: Option<f64>,
    ) {
        self.industries
            .entry(industry.clone())
            .or_default()
            .entry(channel.clone())
            .or_default()
            .percentage = percentage;
    }

    /// Industries that have been displayed at least once.
    pub fn industries(&self) -> impl Iterator<Item = &IndustryId> {
        self.industries.keys()
    }
}

/// Every input the planner reacts to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlannerEvent {
    /// Raw text of the budget field.
    BudgetChanged { value: String },
    IndustryChanged { industry: IndustryId },
    /// Flip inclusion of a channel in the current industry.
    ChannelToggled { channel: ChannelId },
    /// Raw text of a channel's percentage field.
    PercentageChanged { channel: ChannelId, value: String },
}

/// Non-fatal outcome of applying an event.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Notice {
    #[error(transparent)]
    Coercion(#[from] CoercionWarning),
    #[error("unknown industry {0}; selection unchanged")]
    UnknownIndustry(IndustryId),
    #[error("channel {channel} is not offered for {industry}; event ignored")]
    UnknownChannel {
        industry: IndustryId,
        channel: ChannelId,
    },
    #[error("no industry selected; event ignored")]
    NoIndustry,
}

/// State of one channel row in the selection list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelControl {
    pub channel: ChannelId,
    pub included: bool,
    pub percentage: Option<f64>,
    /// The percentage field only accepts edits while the channel is included.
    pub editable: bool,
    /// Cost at the current budget; 0 when excluded.
    pub cost: f64,
}

/// Planner inputs: budget, current industry and the selection store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlannerState {
    pub budget: f64,
    pub industry: Option<IndustryId>,
    pub store: SelectionStore,
}

impl PlannerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `industry` current, initializing its selections on first display.
    pub fn select_industry(
        &mut self,
        catalog: &BenchmarkCatalog,
        industry: &IndustryId,
    ) -> Result<(), Notice> {
        if !catalog.contains_industry(industry) {
            return Err(Notice::UnknownIndustry(industry.clone()));
        }
        self.store.ensure(industry);
        if self.industry.as_ref() != Some(industry) {
            info!(%industry, "industry selected");
        }
        self.industry = Some(industry.clone());
        Ok(())
    }

    fn current_channel(
        &self,
        catalog: &BenchmarkCatalog,
        channel: &ChannelId,
    ) -> Result<IndustryId, Notice> {
        let industry = self.industry.clone().ok_or(Notice::NoIndustry)?;
        if catalog.benchmark(&industry, channel).is_none() {
            return Err(Notice::UnknownChannel {
                industry,
                channel: channel.clone(),
            });
        }
        Ok(industry)
    }

    /// Apply one event in place and report non-fatal notices.
    pub fn apply(&mut self, catalog: &BenchmarkCatalog, event: &PlannerEvent) -> Vec<Notice> {
        let mut notices = Vec::new();
        match event {
            PlannerEvent::BudgetChanged { value } => {
                let (budget, warning) = coerce_budget(value);
                self.budget = budget;
                notices.extend(warning.map(Notice::from));
            }
            PlannerEvent::IndustryChanged { industry } => {
                if let Err(n) = self.select_industry(catalog, industry) {
                    notices.push(n);
                }
            }
            PlannerEvent::ChannelToggled { channel } => {
                match self.current_channel(catalog, channel) {
                    Ok(industry) => {
                        let included = self.store.toggle(&industry, channel);
                        debug!(%industry, %channel, included, "channel toggled");
                    }
                    Err(n) => notices.push(n),
                }
            }
            PlannerEvent::PercentageChanged { channel, value } => {
                match self.current_channel(catalog, channel) {
                    Ok(industry) => {
                        let (pct, warning) = coerce_percentage(channel, value);
                        self.store.set_percentage(&industry, channel, pct);
                        notices.extend(warning.map(Notice::from));
                    }
                    Err(n) => notices.push(n),
                }
            }
        }
        for n in &notices {
            match n {
                Notice::Coercion(_) => debug!(notice = %n, "input coerced"),
                _ => warn!(notice = %n, "event ignored"),
            }
        }
        notices
    }

    fn selections(&self) -> SelectionMap {
        self.industry
            .as_ref()
            .and_then(|i| self.store.selections_for(i))
            .cloned()
            .unwrap_or_default()
    }

    /// Metric rows of the current industry; empty without one.
    pub fn metrics(&self, catalog: &BenchmarkCatalog) -> Vec<MetricRow> {
        match &self.industry {
            Some(industry) => plan_engine::compute(
                self.budget,
                industry,
                catalog.channels_for(industry),
                &self.selections(),
            ),
            None => Vec::new(),
        }
    }

    pub fn totals(&self, rows: &[MetricRow]) -> PlanTotals {
        plan_engine::summarize(self.budget, rows, &self.selections())
    }

    /// Channel list of the current industry in catalog order.
    pub fn channel_controls(
        &self,
        catalog: &BenchmarkCatalog,
        rows: &[MetricRow],
    ) -> Vec<ChannelControl> {
        let Some(industry) = &self.industry else {
            return Vec::new();
        };
        catalog
            .channels_for(industry)
            .into_iter()
            .map(|b| {
                let sel = self
                    .store
                    .get(industry, &b.channel)
                    .cloned()
                    .unwrap_or_default();
                let cost = rows
                    .iter()
                    .find(|r| r.channel == b.channel)
                    .map(|r| r.cost)
                    .unwrap_or(0.0);
                ChannelControl {
                    channel: b.channel.clone(),
                    included: sel.included,
                    percentage: sel.percentage,
                    editable: sel.included,
                    cost,
                }
            })
            .collect()
    }
}

/// Reducer form of [`PlannerState::apply`].
pub fn apply_event(
    mut state: PlannerState,
    catalog: &BenchmarkCatalog,
    event: &PlannerEvent,
) -> (PlannerState, Vec<Notice>) {
    let notices = state.apply(catalog, event);
    (state, notices)
}

/// Everything a renderer needs after a recompute.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanView {
    pub industries: Vec<IndustryId>,
    pub industry: IndustryId,
    pub budget: f64,
    pub channels: Vec<ChannelControl>,
    pub rows: Vec<MetricRow>,
    pub totals: PlanTotals,
    pub notices: Vec<Notice>,
}

/// Consumer of computed plans. Each call replaces the previous rendering.
pub trait PresentationSink {
    fn render(&mut self, view: &PlanView);
    fn render_unavailable(&mut self, error: &LoadError);
}

enum Phase {
    Loading,
    Ready(BenchmarkCatalog),
    Failed(LoadError),
}

/// Coordinates catalog load, state updates and rendering.
pub struct Session<S> {
    phase: Phase,
    state: PlannerState,
    sink: S,
}

impl<S: PresentationSink> Session<S> {
    pub fn new(sink: S) -> Self {
        Self {
            phase: Phase::Loading,
            state: PlannerState::new(),
            sink,
        }
    }

    /// Finish the catalog load. On success the first industry is selected
    /// and rendered; on failure the sink shows an unavailable state.
    pub fn catalog_loaded(&mut self, result: Result<BenchmarkCatalog, LoadError>) {
        if matches!(self.phase, Phase::Ready(_)) {
            warn!("benchmark catalog already loaded; ignoring reload");
            return;
        }
        match result {
            Ok(catalog) => {
                if let Some(first) = catalog.first_industry().cloned() {
                    if let Err(n) = self.state.select_industry(&catalog, &first) {
                        warn!(notice = %n, "cannot select first industry");
                    }
                }
                self.phase = Phase::Ready(catalog);
                self.refresh(Vec::new());
            }
            Err(e) => {
                warn!(error = %e, "planner unavailable");
                self.sink.render_unavailable(&e);
                self.phase = Phase::Failed(e);
            }
        }
    }

    /// Apply an event and re-render. Returns false when nothing was computed
    /// because the catalog is not available.
    pub fn dispatch(&mut self, event: PlannerEvent) -> bool {
        let catalog = match &self.phase {
            Phase::Ready(c) => c,
            Phase::Loading | Phase::Failed(_) => {
                if let PlannerEvent::BudgetChanged { value } = &event {
                    self.state.budget = coerce_budget(value).0;
                } else {
                    warn!(?event, "catalog not loaded; event dropped");
                }
                return false;
            }
        };
        let notices = self.state.apply(catalog, &event);
        self.refresh(notices);
        true
    }

    fn refresh(&mut self, notices: Vec<Notice>) {
        if let Some(mut view) = self.view() {
            view.notices = notices;
            self.sink.render(&view);
        }
    }

    /// Current plan, or `None` until a catalog is loaded.
    pub fn view(&self) -> Option<PlanView> {
        let Phase::Ready(catalog) = &self.phase else {
            return None;
        };
        let industry = self.state.industry.clone()?;
        let rows = self.state.metrics(catalog);
        Some(PlanView {
            industries: catalog.industries().to_vec(),
            industry,
            budget: self.state.budget,
            channels: self.state.channel_controls(catalog, &rows),
            totals: self.state.totals(&rows),
            rows,
            notices: Vec::new(),
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready(_))
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.phase {
            Phase::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn catalog(&self) -> Option<&BenchmarkCatalog> {
        match &self.phase {
            Phase::Ready(c) => Some(c),
            _ => None,
        }
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
