//! End-of-run summary.

use qs_core::{AgentId, LinkId};

/// Why the run stopped.  None of these is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    AllFinished,
    /// `max_sim_time_secs` passed with agents still live.
    MaxTimeReached { unfinished: usize },
    /// The [`CancelToken`](crate::CancelToken) was set.
    Cancelled,
}

/// A departure refused because the first link of the leg was full.  The agent
/// is held and retries every step; only the first refusal is recorded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CapacityWarning {
    pub time:  u64,
    pub agent: AgentId,
    pub link:  LinkId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimReport {
    pub end:                EndReason,
    /// Simulated second of the last processed step (start time if none ran).
    pub final_time:         u64,
    pub steps:              u64,
    pub events_emitted:     u64,
    pub capacity_warnings:  Vec<CapacityWarning>,
    /// Agents handed from one partition to another.
    pub boundary_transfers: u64,
    pub finished_agents:    usize,
    /// Agents finished early because a leg could not be driven.
    pub unreachable_agents: usize,
}
