//! The event vocabulary.
//!
//! Every agent state transition produces exactly one [`Event`].  Events are
//! plain values; subscribers dispatch on [`EventKind`] by pattern match.
//!
//! # Ordering
//!
//! Within a timestamp, events are ordered by agent id and then by
//! [`EventKind::priority`], which follows the order the transitions can occur
//! in for a single agent during one step:
//!
//! | Priority | Kind                                        |
//! |----------|---------------------------------------------|
//! | 0        | `ActivityEnd`                               |
//! | 1        | `Departure`                                 |
//! | 2        | `LinkEnter`                                 |
//! | 3        | `Arrival`                                   |
//! | 4        | `ActivityStart`                             |
//! | 5        | `AgentFinished`, `UnreachableDestination`   |

use std::fmt;

use qs_core::{AgentId, LinkId};

/// Simulation event capturing one agent state change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Simulated second.
    pub time:  u64,
    pub agent: AgentId,
    pub kind:  EventKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The agent's activity on `link` is over; it wants to enter traffic.
    ActivityEnd { link: LinkId },

    /// The agent entered traffic on the first link of its leg.
    Departure { link: LinkId },

    /// The agent left `from` and entered `link`.
    LinkEnter { from: LinkId, link: LinkId },

    /// The agent left traffic from the last link of its leg.
    Arrival { link: LinkId },

    ActivityStart { link: LinkId },

    /// Itinerary complete.
    AgentFinished,

    /// The next leg cannot be driven (`link` is missing or disconnected);
    /// the agent is finished early.
    UnreachableDestination { link: LinkId },
}

impl EventKind {
    /// Tie-break rank among events of one agent at one timestamp.
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::ActivityEnd { .. } => 0,
            EventKind::Departure { .. } => 1,
            EventKind::LinkEnter { .. } => 2,
            EventKind::Arrival { .. } => 3,
            EventKind::ActivityStart { .. } => 4,
            EventKind::AgentFinished | EventKind::UnreachableDestination { .. } => 5,
        }
    }

    /// Stable name used in output files.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::ActivityEnd { .. } => "actend",
            EventKind::Departure { .. } => "departure",
            EventKind::LinkEnter { .. } => "entered link",
            EventKind::Arrival { .. } => "arrival",
            EventKind::ActivityStart { .. } => "actstart",
            EventKind::AgentFinished => "finished",
            EventKind::UnreachableDestination { .. } => "stuck",
        }
    }

    /// The link the event happened on, if any.
    pub fn link(&self) -> Option<LinkId> {
        match *self {
            EventKind::ActivityEnd { link }
            | EventKind::Departure { link }
            | EventKind::LinkEnter { link, .. }
            | EventKind::Arrival { link }
            | EventKind::ActivityStart { link }
            | EventKind::UnreachableDestination { link } => Some(link),
            EventKind::AgentFinished => None,
        }
    }
}

impl Event {
    pub fn new(time: u64, agent: AgentId, kind: EventKind) -> Self {
        Self { time, agent, kind }
    }

    /// Global ordering key: `(time, agent, kind priority)`.
    #[inline]
    pub fn sort_key(&self) -> (u64, AgentId, u8) {
        (self.time, self.agent, self.kind.priority())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={} {} {}", self.time, self.agent, self.kind.event_type())?;
        if let Some(link) = self.kind.link() {
            write!(f, " {link}")?;
        }
        Ok(())
    }
}

/// Merge per-partition event batches into one deterministically ordered
/// sequence.  Batches may arrive in any order.
pub fn merge_events(batches: Vec<Vec<Event>>) -> Vec<Event> {
    let mut merged: Vec<Event> = batches.into_iter().flatten().collect();
    merged.sort_by_key(Event::sort_key);
    merged
}
