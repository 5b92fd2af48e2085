//! `WakeQueue`: sparse per-tick activity-end queue.
//!
//! Most agents spend most of the run at an activity.  Rather than checking
//! every resting agent each step, an agent that starts an activity registers
//! the tick at which that activity ends; each step the partition drains only
//! the agents that are due.
//!
//! `BTreeMap` gives O(log W) insert and pop where W is the number of distinct
//! wake ticks enqueued, and makes `next_tick` (used for idle fast-forward)
//! trivial.

use std::collections::BTreeMap;

use qs_core::{AgentId, Tick};

/// Maps simulation ticks to the agents whose activity ends at that tick.
#[derive(Debug, Default)]
pub struct WakeQueue {
    inner: BTreeMap<Tick, Vec<AgentId>>,
    /// Cached total agent count for O(1) `len()`.
    total: usize,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `agent` to wake at `tick`.
    pub fn push(&mut self, tick: Tick, agent: AgentId) {
        self.inner.entry(tick).or_default().push(agent);
        self.total += 1;
    }

    /// Remove and return every agent scheduled at or before `tick`, sorted
    /// by agent id.
    ///
    /// Returns an empty `Vec` (no allocation) when nothing is due.
    pub fn drain_due(&mut self, tick: Tick) -> Vec<AgentId> {
        if self.next_tick().is_none_or(|t| t > tick) {
            return Vec::new();
        }
        let later = self.inner.split_off(&tick.offset(1));
        let due = std::mem::replace(&mut self.inner, later);
        let mut agents: Vec<AgentId> = due.into_values().flatten().collect();
        self.total -= agents.len();
        agents.sort_unstable();
        agents
    }

    /// The earliest tick with at least one queued agent, or `None` if empty.
    pub fn next_tick(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    /// Total number of queued (tick, agent) entries.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct future ticks that have at least one queued agent.
    pub fn tick_count(&self) -> usize {
        self.inner.len()
    }
}
