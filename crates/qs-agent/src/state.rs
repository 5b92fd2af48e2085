//! The per-agent travel state machine.
//!
//! ```text
//!  AtActivity ──end time──▶ Departing ──first link accepts──▶ EnRoute ─┐
//!      ▲                                                      │   ▲    │ next link
//!      │                                                      │   └────┘ accepts
//!      └──────────────── Arriving ◀──destination link reached─┘
//!                           │
//!  any ──unreachable──▶ Finished ◀──itinerary exhausted
//! ```
//!
//! `Finished` is absorbing.

use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AgentState {
    /// Performing an activity on its link.
    AtActivity,
    /// Activity over; waiting for room on the leg's first link.
    Departing,
    /// In a link queue.
    EnRoute,
    /// Left the destination link; about to start the next activity.
    Arriving,
    Finished,
}

impl AgentState {
    /// `true` while the agent occupies a link queue.
    pub fn is_on_network(self) -> bool {
        matches!(self, AgentState::EnRoute)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, AgentState::Finished)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::AtActivity => "at_activity",
            AgentState::Departing  => "departing",
            AgentState::EnRoute    => "en_route",
            AgentState::Arriving   => "arriving",
            AgentState::Finished   => "finished",
        }
    }
}
