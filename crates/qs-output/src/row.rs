//! Plain data row types written by the CSV writers.

use qs_events::{Event, EventKind};
use qs_sim::StepStats;
use serde::Serialize;

/// One line of `events.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventRow {
    pub time:      u64,
    pub agent:     u32,
    #[serde(rename = "type")]
    pub kind:      &'static str,
    /// Empty for events without a link.
    pub link:      Option<u32>,
    /// The link left, for link entries only.
    pub from_link: Option<u32>,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        let from_link = match event.kind {
            EventKind::LinkEnter { from, .. } => Some(from.0),
            _ => None,
        };
        Self {
            time: event.time,
            agent: event.agent.0,
            kind: event.kind.event_type(),
            link: event.kind.link().map(|l| l.0),
            from_link,
        }
    }
}

/// One line of `step_summaries.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepSummaryRow {
    pub tick:               u64,
    pub time:               u64,
    pub events:             usize,
    pub departures:         usize,
    pub link_moves:         usize,
    pub arrivals:           usize,
    pub blocked_links:      usize,
    pub blocked_departures: usize,
    pub en_route:           usize,
    pub departing:          usize,
    pub finished_total:     usize,
    pub boundary_transfers: usize,
}

impl From<&StepStats> for StepSummaryRow {
    fn from(s: &StepStats) -> Self {
        Self {
            tick:               s.tick,
            time:               s.time,
            events:             s.events,
            departures:         s.departures,
            link_moves:         s.link_moves,
            arrivals:           s.arrivals,
            blocked_links:      s.blocked_links,
            blocked_departures: s.blocked_departures,
            en_route:           s.en_route,
            departing:          s.departing,
            finished_total:     s.finished_total,
            boundary_transfers: s.boundary_transfers,
        }
    }
}
