//! The `Sim` struct and its step loop.

use qs_agent::Agent;
use qs_core::{AgentId, LinkId, SimClock, SimConfig};
use qs_events::{Event, EventBus};
use qs_mobility::LinkQueue;
use qs_network::{NetworkGraph, Partitioning};

use crate::exchange::{self, Transfer};
use crate::partition::{PartitionState, StepCtx};
use crate::workers::Workers;
use crate::{
    CancelToken, CapacityWarning, EndReason, SimError, SimObserver, SimReport, SimResult,
    StepStats,
};

/// The main simulation runner.
///
/// `Sim` owns the network, its partitioning and one [`PartitionState`] per
/// partition, and drives the five-phase step loop:
///
/// 1. **Local** (per partition, parallel): accrue link flow, wake agents whose
///    activity ends, publish departure and link-head offers.
/// 2. **Resolve** (sequential): decide every offer in a global order that
///    does not depend on the partitioning.
/// 3. **Apply** (parallel): pop accepted entities, run their transitions,
///    emit events, package link entries as transfers.
/// 4. **Handoff** (parallel): each partition inserts the transfers targeting
///    its links in resolution order.
/// 5. **Finalize** (sequential): merge the partitions' events into the
///    [`EventBus`] and report [`StepStats`].
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub(crate) config:             SimConfig,
    pub(crate) clock:              SimClock,
    pub(crate) graph:              NetworkGraph,
    pub(crate) partitioning:       Partitioning,
    pub(crate) parts:              Vec<PartitionState>,
    pub(crate) workers:            Workers,
    pub(crate) cancel:             CancelToken,
    pub(crate) steps:              u64,
    pub(crate) last_step_time:     Option<u64>,
    pub(crate) events_emitted:     u64,
    pub(crate) boundary_transfers: u64,
    pub(crate) capacity_warnings:  Vec<CapacityWarning>,
}

impl Sim {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run until every agent has finished, `max_sim_time_secs` has passed or
    /// the cancel token is set.
    ///
    /// Events go to `bus`; `observer` gets step callbacks.  Hitting the time
    /// limit or being cancelled is reported in [`SimReport::end`], not as an
    /// error.  Any error aborts the run.
    pub fn run<O: SimObserver>(
        &mut self,
        bus:      &mut EventBus<'_>,
        observer: &mut O,
    ) -> SimResult<SimReport> {
        tracing::info!(
            agents = self.live_agents(),
            links = self.graph.link_count(),
            partitions = self.parts.len(),
            start = self.clock.now_secs(),
            "simulation started"
        );

        let end = loop {
            if self.cancel.is_cancelled() {
                break EndReason::Cancelled;
            }
            let live = self.live_agents();
            if live == 0 {
                break EndReason::AllFinished;
            }
            self.fast_forward();
            if self.clock.now_secs() > self.config.max_sim_time_secs {
                break EndReason::MaxTimeReached { unfinished: live };
            }
            self.step(bus, observer)?;
            self.clock.advance();
        };

        let report = self.report(end);
        bus.finish(report.final_time);
        observer.on_sim_end(&report);
        tracing::info!(
            end = ?report.end,
            final_time = report.final_time,
            steps = report.steps,
            events = report.events_emitted,
            finished = report.finished_agents,
            unreachable = report.unreachable_agents,
            capacity_warnings = report.capacity_warnings.len(),
            "simulation finished"
        );
        Ok(report)
    }

    /// Run exactly `n` steps from the current position, without the end
    /// checks or idle fast-forward of [`run`](Self::run).
    ///
    /// Useful for tests and incremental stepping.
    pub fn run_steps<O: SimObserver>(
        &mut self,
        n:        u64,
        bus:      &mut EventBus<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        for _ in 0..n {
            self.step(bus, observer)?;
            self.clock.advance();
        }
        Ok(())
    }

    /// Summary of the run so far.
    pub fn report(&self, end: EndReason) -> SimReport {
        SimReport {
            end,
            final_time: self.last_step_time.unwrap_or(self.config.start_time_secs),
            steps: self.steps,
            events_emitted: self.events_emitted,
            capacity_warnings: self.capacity_warnings.clone(),
            boundary_transfers: self.boundary_transfers,
            finished_agents: self.parts.iter().map(PartitionState::finished_count).sum(),
            unreachable_agents: self.parts.iter().map(PartitionState::unreachable_count).sum(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn partitioning(&self) -> &Partitioning {
        &self.partitioning
    }

    /// Agents not yet finished.
    pub fn live_agents(&self) -> usize {
        self.parts.iter().map(PartitionState::live_count).sum()
    }

    /// Every agent, live or finished, ascending by id.
    pub fn agents(&self) -> Vec<&Agent> {
        let mut all: Vec<&Agent> = self.parts.iter().flat_map(PartitionState::agents).collect();
        all.sort_unstable_by_key(|a| a.id);
        all
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.parts.iter().flat_map(PartitionState::agents).find(|a| a.id == id)
    }

    pub fn link_queue(&self, link: LinkId) -> Option<&LinkQueue> {
        self.parts
            .get(self.partitioning.link_owner(link).index())
            .and_then(|p| p.link_queue(link))
    }

    /// Entities on `link` (0 for unknown links).
    pub fn link_occupancy(&self, link: LinkId) -> usize {
        self.link_queue(link).map_or(0, LinkQueue::occupancy)
    }

    pub fn capacity_warnings(&self) -> &[CapacityWarning] {
        &self.capacity_warnings
    }

    // ── Step processing ───────────────────────────────────────────────────

    /// Skip steps in which nothing can happen: no entity on any link, nobody
    /// departing, and the next activity end still in the future.
    fn fast_forward(&mut self) {
        if !self.parts.iter().all(PartitionState::is_quiescent) {
            return;
        }
        let Some(next) = self.parts.iter().filter_map(PartitionState::next_wake).min() else {
            return;
        };
        let current = self.clock.current_tick;
        if next <= current {
            return;
        }
        let skipped = next - current;
        for part in &mut self.parts {
            part.idle(skipped);
        }
        self.clock.advance_to(next);
        tracing::debug!(from = %current, to = %next, skipped, "idle steps skipped");
    }

    fn step<O: SimObserver>(&mut self, bus: &mut EventBus<'_>, observer: &mut O) -> SimResult<()> {
        observer.on_step_start(&self.clock);

        let tick = self.clock.current_tick;
        let now = self.clock.now_secs();
        // Explicit field borrows so the borrow checker sees disjoint access.
        let ctx = StepCtx {
            graph: &self.graph,
            partitioning: &self.partitioning,
            clock: &self.clock,
            tick,
            now,
        };
        let workers = &self.workers;
        let parts = &mut self.parts;

        // ── Phase 1: local ────────────────────────────────────────────────
        let mut outputs = workers.each(parts, |p| p.local_phase(ctx))?;

        // ── Phase 2: resolve ──────────────────────────────────────────────
        let resolution = {
            let view: &[PartitionState] = parts;
            exchange::resolve(
                &mut outputs,
                |link| {
                    view.get(ctx.partitioning.link_owner(link).index())
                        .and_then(|p| p.link_queue(link))
                        .map_or(0, LinkQueue::free_at_step_start)
                },
                now,
            )
        };

        // ── Phase 3: apply ────────────────────────────────────────────────
        let outgoing = workers.zip_each(parts, outputs, |p, out| p.apply_phase(out, ctx))?;

        // ── Route transfers to the owners of their target links ───────────
        let mut inboxes: Vec<Vec<Transfer>> = (0..parts.len()).map(|_| Vec::new()).collect();
        let mut boundary = 0usize;
        for (sender, batch) in outgoing.into_iter().enumerate() {
            for transfer in batch {
                let owner = ctx.partitioning.link_owner(transfer.target).index();
                if owner != sender {
                    boundary += 1;
                }
                inboxes
                    .get_mut(owner)
                    .ok_or_else(|| {
                        SimError::InvariantViolation(format!(
                            "{} owned by missing partition {owner}",
                            transfer.target
                        ))
                    })?
                    .push(transfer);
            }
        }

        // ── Phase 4: handoff ──────────────────────────────────────────────
        workers.zip_each(parts, inboxes, |p, inbox| p.handoff_phase(inbox, ctx))?;

        // ── Phase 5: finalize ─────────────────────────────────────────────
        let batches: Vec<Vec<Event>> = parts.iter_mut().map(PartitionState::take_events).collect();
        let events = bus.finalize_step(now, batches)?;

        let stats = StepStats {
            tick: tick.0,
            time: now,
            events,
            departures: resolution.departures,
            link_moves: resolution.moves,
            arrivals: resolution.arrivals,
            blocked_links: resolution.blocked_links,
            blocked_departures: resolution.blocked_departures,
            en_route: parts.iter().map(PartitionState::en_route_count).sum(),
            departing: parts.iter().map(PartitionState::departing_count).sum(),
            finished_total: parts.iter().map(PartitionState::finished_count).sum(),
            boundary_transfers: boundary,
        };

        self.steps += 1;
        self.last_step_time = Some(now);
        self.events_emitted += events as u64;
        self.boundary_transfers += boundary as u64;
        self.capacity_warnings.extend(resolution.warnings);

        tracing::debug!(
            time = now,
            events,
            departures = stats.departures,
            moves = stats.link_moves,
            arrivals = stats.arrivals,
            blocked = stats.blocked_links,
            en_route = stats.en_route,
            "step complete"
        );
        observer.on_step_end(&stats);
        Ok(())
    }
}
