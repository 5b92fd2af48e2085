//! `LinkQueue`: the runtime state of one directed link.
//!
//! # Model
//!
//! A link is a FIFO of entities ordered by entry.  An entity may leave when
//!
//! 1. its `earliest_exit` has passed (free-flow traversal, at least one step),
//! 2. every entity ahead of it has left (head-of-line blocking), and
//! 3. the link's [`FlowBucket`] has a whole credit for it this step.
//!
//! Entry is limited by storage: the queue never holds more than
//! `max(1, floor(storage_capacity * storage_capacity_factor))` entities.
//!
//! # Offer / commit
//!
//! Leaving a link also requires room downstream, which is decided outside the
//! queue.  [`poll_departures`](LinkQueue::poll_departures) therefore only
//! *offers* the ready head prefix without removing anything; the caller then
//! removes the accepted part with
//! [`commit_departures`](LinkQueue::commit_departures).

use std::collections::VecDeque;

use qs_core::{AgentId, LinkId, SimConfig};
use qs_network::{Link, NetworkGraph};

use crate::{FlowBucket, MobilityError, MobilityResult};

/// One entity in a link queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueuedAgent {
    pub agent:         AgentId,
    /// Simulated second the entity entered the link.
    pub entered_at:    u64,
    /// First simulated second at which it may leave.
    pub earliest_exit: u64,
}

/// Result of [`LinkQueue::try_enter`].
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Entered,
    /// Storage is full; the entity is handed back to the caller, which keeps
    /// it where it was.
    Rejected(AgentId),
}

#[derive(Clone, Debug)]
pub struct LinkQueue {
    link:               LinkId,
    /// Seconds an entity entering from upstream spends before it may leave.
    travel_secs:        u64,
    step_secs:          u64,
    storage_cap:        usize,
    queue:              VecDeque<QueuedAgent>,
    bucket:             FlowBucket,
    occupancy_at_start: usize,
}

impl LinkQueue {
    /// Runtime queue for `link` under the run's capacity factors and step.
    pub fn new(link: &Link, capacity_period_secs: f64, config: &SimConfig) -> Self {
        let step_secs = config.time_step_secs as u64;
        let per_step = link.capacity / capacity_period_secs
            * config.flow_capacity_factor
            * config.time_step_secs as f64;
        let storage_cap =
            ((link.storage_capacity * config.storage_capacity_factor).floor() as usize).max(1);
        Self {
            link: link.id,
            travel_secs: link.free_flow_secs().max(step_secs),
            step_secs,
            storage_cap,
            queue: VecDeque::new(),
            bucket: FlowBucket::new(per_step),
            occupancy_at_start: 0,
        }
    }

    /// Convenience wrapper looking `link` up in `graph`.
    pub fn for_link(graph: &NetworkGraph, link: LinkId, config: &SimConfig) -> MobilityResult<Self> {
        Ok(Self::new(graph.link(link)?, graph.capacity_period_secs(), config))
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn occupancy(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn storage_capacity(&self) -> usize {
        self.storage_cap
    }

    /// Occupancy when [`begin_step`](Self::begin_step) was last called.
    pub fn occupancy_at_step_start(&self) -> usize {
        self.occupancy_at_start
    }

    /// Free storage as of the start of the step.
    pub fn free_at_step_start(&self) -> usize {
        self.storage_cap.saturating_sub(self.occupancy_at_start)
    }

    pub fn travel_secs(&self) -> u64 {
        self.travel_secs
    }

    pub fn bucket(&self) -> &FlowBucket {
        &self.bucket
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedAgent> {
        self.queue.iter()
    }

    pub fn head(&self) -> Option<&QueuedAgent> {
        self.queue.front()
    }

    // ── Step protocol ─────────────────────────────────────────────────────

    /// Accrue this step's flow credits and snapshot the occupancy.
    pub fn begin_step(&mut self) {
        self.bucket.accrue();
        self.occupancy_at_start = self.queue.len();
    }

    /// Fast-forward the flow bank over `steps` idle steps.
    pub fn idle_steps(&mut self, steps: u64) {
        self.bucket.idle_accrue(steps);
    }

    /// Try to append `agent` at time `now`.
    ///
    /// `from` is the link the entity is leaving, or `None` for an entity
    /// entering traffic from an activity on this link; such an entity starts
    /// at the downstream end and may leave from the next step on.
    ///
    /// Entering from a link whose downstream node is not this link's upstream
    /// node is an [`MobilityError::InvariantViolation`].
    pub fn try_enter(
        &mut self,
        agent: AgentId,
        from: Option<LinkId>,
        now: u64,
        graph: &NetworkGraph,
    ) -> MobilityResult<Admission> {
        let earliest_exit = match from {
            None => now + self.step_secs,
            Some(prev) => {
                if !graph.is_adjacent(prev, self.link) {
                    return Err(MobilityError::InvariantViolation {
                        link:   self.link,
                        reason: format!("{agent} entered from non-adjacent {prev}"),
                    });
                }
                now + self.travel_secs
            }
        };
        if self.queue.len() >= self.storage_cap {
            tracing::debug!(link = %self.link, %agent, "storage full, entry refused");
            return Ok(Admission::Rejected(agent));
        }
        self.queue.push_back(QueuedAgent { agent, entered_at: now, earliest_exit });
        Ok(Admission::Entered)
    }

    /// Entities that may leave at `now`: the head prefix whose earliest exit
    /// has passed, cut to the flow budget.  Nothing is removed.
    pub fn poll_departures(&self, now: u64) -> Vec<QueuedAgent> {
        self.queue
            .iter()
            .take(self.bucket.budget())
            .take_while(|q| q.earliest_exit <= now)
            .copied()
            .collect()
    }

    /// Remove the first `n` entities, which must have been offered by
    /// [`poll_departures`](Self::poll_departures) this step, spending one flow
    /// credit each.
    pub fn commit_departures(&mut self, n: usize, now: u64) -> MobilityResult<Vec<QueuedAgent>> {
        let ready = self.queue.iter().take_while(|q| q.earliest_exit <= now).count();
        if n > ready || n > self.bucket.budget() {
            return Err(MobilityError::InvariantViolation {
                link:   self.link,
                reason: format!(
                    "commit of {n} exceeds offer (ready {ready}, budget {})",
                    self.bucket.budget()
                ),
            });
        }
        self.bucket.consume(n);
        Ok(self.queue.drain(..n).collect())
    }
}
