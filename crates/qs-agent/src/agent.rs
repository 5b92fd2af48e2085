//! `Agent`: identity, itinerary and position, advanced only through the
//! checked transition methods.
//!
//! Each transition corresponds to exactly one event kind; the simulation
//! emits the event after the transition succeeds.  A transition attempted
//! from the wrong state returns [`AgentError::IllegalTransition`] and leaves
//! the agent untouched.

use qs_core::{AgentId, LinkId};

use crate::itinerary::{Activity, Itinerary, Leg};
use crate::{AgentError, AgentResult, AgentState};

#[derive(Clone, Debug)]
pub struct Agent {
    pub id:         AgentId,
    itinerary:      Itinerary,
    /// Index into `itinerary.segments()`.  Only ever increases.
    segment:        usize,
    /// Index into the current leg's route while `Departing`/`EnRoute`/`Arriving`.
    route_index:    usize,
    state:          AgentState,
    /// When the current activity started (sim start for the first one).
    activity_start: u64,
}

impl Agent {
    /// A new agent performing the first activity of `itinerary`, which began
    /// at `start_secs`.
    pub fn new(id: AgentId, itinerary: Itinerary, start_secs: u64) -> Self {
        Self {
            id,
            itinerary,
            segment: 0,
            route_index: 0,
            state: AgentState::AtActivity,
            activity_start: start_secs,
        }
    }

    // ── Read access ───────────────────────────────────────────────────────

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn segment_index(&self) -> usize {
        self.segment
    }

    pub fn route_index(&self) -> usize {
        self.route_index
    }

    pub fn itinerary(&self) -> &Itinerary {
        &self.itinerary
    }

    /// The activity being performed, if `AtActivity` (or `Finished` at the
    /// final activity).
    pub fn current_activity(&self) -> Option<&Activity> {
        self.itinerary.activity(self.segment)
    }

    /// The leg being travelled, if any.
    pub fn current_leg(&self) -> Option<&Leg> {
        self.itinerary.leg(self.segment)
    }

    /// The leg following the current activity, if any.
    pub fn next_leg(&self) -> Option<&Leg> {
        self.current_activity()?;
        self.itinerary.leg(self.segment + 1)
    }

    /// The activity following the current leg, if any.
    pub fn next_activity(&self) -> Option<&Activity> {
        self.current_leg()?;
        self.itinerary.activity(self.segment + 1)
    }

    /// Link the agent is on, or at.
    pub fn current_link(&self) -> Option<LinkId> {
        match self.state {
            AgentState::AtActivity | AgentState::Finished => {
                self.current_activity().map(|a| a.link)
            }
            AgentState::Departing | AgentState::EnRoute | AgentState::Arriving => {
                self.current_leg().and_then(|l| l.route.get(self.route_index).copied())
            }
        }
    }

    /// The link after the current one on this leg; `None` on the last link,
    /// where the agent leaves the network.
    pub fn next_link(&self) -> Option<LinkId> {
        if self.state != AgentState::EnRoute {
            return None;
        }
        self.current_leg()?.route.get(self.route_index + 1).copied()
    }

    /// End time of the current activity given when it started.
    pub fn activity_end(&self) -> Option<u64> {
        match self.state {
            AgentState::AtActivity => self.current_activity()?.end_after(self.activity_start),
            _ => None,
        }
    }

    /// `true` when the current activity is the itinerary's last.
    pub fn at_final_activity(&self) -> bool {
        self.state == AgentState::AtActivity && self.segment + 1 >= self.itinerary.len()
    }

    // ── Transitions ───────────────────────────────────────────────────────

    fn illegal(&self, action: &'static str) -> AgentError {
        AgentError::IllegalTransition { agent: self.id, from: self.state, action }
    }

    /// AtActivity → Departing.  Returns the leg's first link.
    pub fn end_activity(&mut self) -> AgentResult<LinkId> {
        if self.state != AgentState::AtActivity {
            return Err(self.illegal("end_activity"));
        }
        let first = self
            .next_leg()
            .and_then(|l| l.route.first().copied())
            .ok_or_else(|| self.illegal("end_activity"))?;
        self.segment += 1;
        self.route_index = 0;
        self.state = AgentState::Departing;
        Ok(first)
    }

    /// Departing → EnRoute on the leg's first link.
    pub fn enter_network(&mut self) -> AgentResult<LinkId> {
        if self.state != AgentState::Departing {
            return Err(self.illegal("enter_network"));
        }
        let link = self.current_link().ok_or_else(|| self.illegal("enter_network"))?;
        self.state = AgentState::EnRoute;
        Ok(link)
    }

    /// EnRoute → EnRoute onto the next route link.  Returns `(left, entered)`.
    pub fn advance_link(&mut self) -> AgentResult<(LinkId, LinkId)> {
        let (Some(from), Some(to)) = (self.current_link(), self.next_link()) else {
            return Err(self.illegal("advance_link"));
        };
        self.route_index += 1;
        Ok((from, to))
    }

    /// EnRoute → Arriving, leaving the network from the destination link.
    pub fn arrive(&mut self) -> AgentResult<LinkId> {
        if self.state != AgentState::EnRoute || self.next_link().is_some() {
            return Err(self.illegal("arrive"));
        }
        let link = self.current_link().ok_or_else(|| self.illegal("arrive"))?;
        self.state = AgentState::Arriving;
        Ok(link)
    }

    /// Arriving → AtActivity for the next activity, started at `now`.
    pub fn start_activity(&mut self, now: u64) -> AgentResult<LinkId> {
        if self.state != AgentState::Arriving || self.next_activity().is_none() {
            return Err(self.illegal("start_activity"));
        }
        self.segment += 1;
        self.route_index = 0;
        self.state = AgentState::AtActivity;
        self.activity_start = now;
        self.current_activity()
            .map(|a| a.link)
            .ok_or_else(|| self.illegal("start_activity"))
    }

    /// AtActivity → Finished once no leg follows.
    pub fn finish(&mut self) -> AgentResult<()> {
        if !self.at_final_activity() {
            return Err(self.illegal("finish"));
        }
        self.state = AgentState::Finished;
        Ok(())
    }

    /// Any live state → Finished because the itinerary cannot be completed.
    pub fn abort(&mut self) -> AgentResult<()> {
        if self.state == AgentState::Finished {
            return Err(self.illegal("abort"));
        }
        self.state = AgentState::Finished;
        Ok(())
    }
}
