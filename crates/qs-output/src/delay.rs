//! `DelayAnalyzer`: congestion delay from the event stream alone.
//!
//! A link traversal runs from the agent's `LinkEnter` onto the link until it
//! enters the next link or arrives.  Its delay is the time spent beyond the
//! link's free-flow traversal time.  The link an agent departs onto is not
//! counted: the agent starts at its downstream end.
//!
//! Delays are binned by the time the traversal ended, with bins labelled by
//! their (exclusive) end time.  Everything is keyed by id in ordered maps, so
//! two identical streams produce identical results.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use qs_core::{AgentId, LinkId};
use qs_events::{Event, EventHandler, EventKind};
use qs_network::NetworkGraph;
use serde::Serialize;

use crate::OutputResult;

pub const LINK_DELAYS_FILE: &str = "link_delays.csv";

/// Accumulated delay on one link in one time bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DelayBin {
    pub total_delay_secs: u64,
    pub traversals:       u64,
}

impl DelayBin {
    pub fn average(&self) -> f64 {
        if self.traversals == 0 {
            0.0
        } else {
            self.total_delay_secs as f64 / self.traversals as f64
        }
    }

    fn add(&mut self, delay: u64) {
        self.total_delay_secs += delay;
        self.traversals += 1;
    }
}

/// Per-agent totals over all completed trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentDelay {
    pub trips:       u64,
    /// Departure to arrival, summed over trips.
    pub travel_secs: u64,
    pub delay_secs:  u64,
}

/// Run-wide totals, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DelaySummary {
    pub trips:             u64,
    pub total_travel_secs: u64,
    pub total_delay_secs:  u64,
    pub traversals:        u64,
    pub mean_link_delay:   f64,
}

#[derive(Debug, Clone, Copy)]
struct OpenTrip {
    departed: u64,
    /// Current link and when it was entered; `None` on the departure link.
    on_link:  Option<(LinkId, u64)>,
    delay:    u64,
}

#[derive(Serialize)]
struct LinkDelayRow {
    link:             u32,
    bin_end:          u64,
    traversals:       u64,
    total_delay_secs: u64,
    mean_delay_secs:  f64,
}

pub struct DelayAnalyzer {
    /// Free-flow traversal seconds per link id.
    free_flow: Vec<u64>,
    bin_secs:  u64,
    open:      BTreeMap<AgentId, OpenTrip>,
    bins:      BTreeMap<(LinkId, u64), DelayBin>,
    links:     BTreeMap<LinkId, DelayBin>,
    agents:    BTreeMap<AgentId, AgentDelay>,
}

impl DelayAnalyzer {
    /// Analyzer for runs on `graph`, binning by `bin_secs` (at least 1).
    pub fn new(graph: &NetworkGraph, bin_secs: u64) -> Self {
        Self {
            free_flow: graph.links().iter().map(|l| l.free_flow_secs()).collect(),
            bin_secs:  bin_secs.max(1),
            open:      BTreeMap::new(),
            bins:      BTreeMap::new(),
            links:     BTreeMap::new(),
            agents:    BTreeMap::new(),
        }
    }

    pub fn bin_secs(&self) -> u64 {
        self.bin_secs
    }

    fn bin_end(&self, time: u64) -> u64 {
        (time / self.bin_secs + 1) * self.bin_secs
    }

    /// End the trip's current traversal at `left`.
    fn close(&mut self, trip: &mut OpenTrip, left: u64) {
        let Some((link, entered)) = trip.on_link else {
            return;
        };
        let free = self.free_flow.get(link.index()).copied().unwrap_or(0);
        let delay = (left - entered).saturating_sub(free);
        let bin = self.bin_end(left);
        self.bins.entry((link, bin)).or_default().add(delay);
        self.links.entry(link).or_default().add(delay);
        trip.delay += delay;
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Delay on `link` in the bin ending at `bin_end`.
    pub fn link_delay(&self, link: LinkId, bin_end: u64) -> Option<DelayBin> {
        self.bins.get(&(link, bin_end)).copied()
    }

    /// All bins of `link`, ascending by bin end.
    pub fn bins_for(&self, link: LinkId) -> Vec<(u64, DelayBin)> {
        self.bins
            .range((link, 0)..=(link, u64::MAX))
            .map(|(&(_, end), &bin)| (end, bin))
            .collect()
    }

    /// Mean delay per traversal of `link`, if anyone traversed it.
    pub fn average_link_delay(&self, link: LinkId) -> Option<f64> {
        self.links.get(&link).map(DelayBin::average)
    }

    pub fn agent(&self, agent: AgentId) -> Option<AgentDelay> {
        self.agents.get(&agent).copied()
    }

    pub fn agents(&self) -> &BTreeMap<AgentId, AgentDelay> {
        &self.agents
    }

    /// Trips started but not yet arrived.
    pub fn open_trips(&self) -> usize {
        self.open.len()
    }

    pub fn summary(&self) -> DelaySummary {
        let mut s = DelaySummary::default();
        for a in self.agents.values() {
            s.trips += a.trips;
            s.total_travel_secs += a.travel_secs;
        }
        for l in self.links.values() {
            s.total_delay_secs += l.total_delay_secs;
            s.traversals += l.traversals;
        }
        if s.traversals > 0 {
            s.mean_link_delay = s.total_delay_secs as f64 / s.traversals as f64;
        }
        s
    }

    // ── Output ────────────────────────────────────────────────────────────

    /// Write every (link, bin) to `writer` as CSV.
    pub fn write_link_delays<W: Write>(&self, writer: W) -> OutputResult<()> {
        let mut out = csv::Writer::from_writer(writer);
        for (&(link, bin_end), bin) in &self.bins {
            out.serialize(LinkDelayRow {
                link: link.0,
                bin_end,
                traversals: bin.traversals,
                total_delay_secs: bin.total_delay_secs,
                mean_delay_secs: bin.average(),
            })?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write `link_delays.csv` into `dir`.
    pub fn write_link_delays_csv(&self, dir: &Path) -> OutputResult<()> {
        self.write_link_delays(std::fs::File::create(dir.join(LINK_DELAYS_FILE))?)
    }
}

impl EventHandler for DelayAnalyzer {
    fn handle_event(&mut self, event: &Event) {
        match event.kind {
            EventKind::Departure { .. } => {
                self.open.insert(
                    event.agent,
                    OpenTrip { departed: event.time, on_link: None, delay: 0 },
                );
            }
            EventKind::LinkEnter { link, .. } => {
                let Some(mut trip) = self.open.remove(&event.agent) else {
                    return;
                };
                self.close(&mut trip, event.time);
                trip.on_link = Some((link, event.time));
                self.open.insert(event.agent, trip);
            }
            EventKind::Arrival { .. } => {
                let Some(mut trip) = self.open.remove(&event.agent) else {
                    return;
                };
                self.close(&mut trip, event.time);
                let totals = self.agents.entry(event.agent).or_default();
                totals.trips += 1;
                totals.travel_secs += event.time - trip.departed;
                totals.delay_secs += trip.delay;
            }
            EventKind::ActivityEnd { .. }
            | EventKind::ActivityStart { .. }
            | EventKind::AgentFinished
            | EventKind::UnreachableDestination { .. } => {}
        }
    }

    fn on_run_end(&mut self, final_time: u64) {
        if !self.open.is_empty() {
            tracing::debug!(open = self.open.len(), final_time, "trips still under way at run end");
        }
    }
}
