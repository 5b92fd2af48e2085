//! `PartitionState`: everything one worker owns: its links, the agents on
//! or at those links, and their activity-end wake-ups.
//!
//! An agent always lives in the partition that owns its current link (the
//! activity link while resting, the queue it sits in while travelling).  It
//! moves between partitions only inside a [`Transfer`].

use std::collections::BTreeMap;

use qs_agent::{check_route, Agent, AgentState, WakeQueue};
use qs_core::{AgentId, LinkId, PartitionId, SimClock, Tick};
use qs_events::{Event, EventKind};
use qs_mobility::{Admission, LinkQueue};
use qs_network::{NetworkGraph, Partitioning};

use crate::exchange::{DepartureOffer, LinkOffers, LocalOutput, Offer, OfferKind, Transfer};
use crate::{SimError, SimResult};

/// Read-only inputs shared by every partition during one step.
#[derive(Copy, Clone)]
pub(crate) struct StepCtx<'a> {
    pub graph:        &'a NetworkGraph,
    pub partitioning: &'a Partitioning,
    pub clock:        &'a SimClock,
    pub tick:         Tick,
    pub now:          u64,
}

#[derive(Debug)]
pub(crate) struct PartitionState {
    pub id:      PartitionId,
    links:       BTreeMap<LinkId, LinkQueue>,
    /// Live agents: resting, departing and en route.
    agents:      BTreeMap<AgentId, Agent>,
    wake:        WakeQueue,
    /// Agents waiting to enter their first link; `true` once refused.
    departing:   BTreeMap<AgentId, bool>,
    /// Queued agents whose move was refused, with the full target.
    held:        BTreeMap<AgentId, LinkId>,
    finished:    Vec<Agent>,
    unreachable: usize,
    events:      Vec<Event>,
}

fn invariant(msg: String) -> SimError {
    SimError::InvariantViolation(msg)
}

impl PartitionState {
    pub fn new(id: PartitionId) -> Self {
        Self {
            id,
            links: BTreeMap::new(),
            agents: BTreeMap::new(),
            wake: WakeQueue::new(),
            departing: BTreeMap::new(),
            held: BTreeMap::new(),
            finished: Vec::new(),
            unreachable: 0,
            events: Vec::new(),
        }
    }

    pub fn add_link(&mut self, queue: LinkQueue) {
        self.links.insert(queue.link(), queue);
    }

    /// Place a resting agent and schedule the end of its current activity.
    pub fn add_agent(&mut self, agent: Agent, clock: &SimClock) {
        let wake = match agent.activity_end() {
            Some(end) => clock.tick_at_or_after(end),
            None => Tick::ZERO,
        };
        self.wake.push(wake, agent.id);
        self.agents.insert(agent.id, agent);
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn live_count(&self) -> usize {
        self.agents.len()
    }

    pub fn departing_count(&self) -> usize {
        self.departing.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn unreachable_count(&self) -> usize {
        self.unreachable
    }

    pub fn en_route_count(&self) -> usize {
        self.links.values().map(LinkQueue::occupancy).sum()
    }

    /// No entity on any link and nobody waiting to depart.
    pub fn is_quiescent(&self) -> bool {
        self.departing.is_empty() && self.links.values().all(LinkQueue::is_empty)
    }

    pub fn next_wake(&self) -> Option<Tick> {
        self.wake.next_tick()
    }

    pub fn link_queue(&self, link: LinkId) -> Option<&LinkQueue> {
        self.links.get(&link)
    }

    /// Live and finished agents.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().chain(self.finished.iter())
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Advance every link's flow bank over `steps` skipped steps.
    pub fn idle(&mut self, steps: u64) {
        for q in self.links.values_mut() {
            q.idle_steps(steps);
        }
    }

    // ── Local phase ───────────────────────────────────────────────────────

    /// Accrue flow, wake due agents and publish this partition's offers.
    pub fn local_phase(&mut self, ctx: StepCtx<'_>) -> SimResult<LocalOutput> {
        for q in self.links.values_mut() {
            q.begin_step();
        }
        for id in self.wake.drain_due(ctx.tick) {
            self.wake_agent(id, ctx)?;
        }

        let mut out = LocalOutput::default();
        for (&agent, &refused) in &self.departing {
            let link = self
                .agents
                .get(&agent)
                .and_then(Agent::current_link)
                .ok_or_else(|| invariant(format!("departing {agent} has no link in {}", self.id)))?;
            out.departures.push(DepartureOffer { agent, link, first_attempt: !refused, seq: None });
        }

        for (&link, q) in &self.links {
            let ready = q.poll_departures(ctx.now);
            if ready.is_empty() {
                continue;
            }
            let mut offers = Vec::with_capacity(ready.len());
            for entry in ready {
                let agent = self.agents.get(&entry.agent).ok_or_else(|| {
                    invariant(format!("{} queued on {link} but not held by {}", entry.agent, self.id))
                })?;
                let kind = match agent.next_link() {
                    Some(to) => OfferKind::Move { to },
                    None => OfferKind::Arrive,
                };
                let first_attempt = match kind {
                    OfferKind::Move { to } => self.held.get(&entry.agent) != Some(&to),
                    OfferKind::Arrive => true,
                };
                offers.push(Offer { agent: entry.agent, kind, first_attempt, seq: None });
            }
            let certain_exits = offers.iter().take_while(|o| o.kind == OfferKind::Arrive).count();
            out.links.push(LinkOffers { link, offers, certain_exits, accepted: 0, refused: false });
        }
        Ok(out)
    }

    fn wake_agent(&mut self, id: AgentId, ctx: StepCtx<'_>) -> SimResult<()> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| invariant(format!("woke unknown {id} in {}", self.id)))?;
        if agent.state() != AgentState::AtActivity {
            return Err(invariant(format!("woke {id} while {}", agent.state().as_str())));
        }

        if agent.at_final_activity() {
            agent.finish()?;
            self.events.push(Event::new(ctx.now, id, EventKind::AgentFinished));
            self.archive(id);
            return Ok(());
        }

        let seg = agent.segment_index();
        let (Some(origin), Some(leg), Some(dest)) = (
            agent.current_link(),
            agent.next_leg(),
            agent.itinerary().activity(seg + 2),
        ) else {
            return Err(invariant(format!("{id} has no leg after activity {seg}")));
        };

        match check_route(ctx.graph, origin, dest.link, &leg.route) {
            Ok(()) => {
                agent.end_activity()?;
                self.events.push(Event::new(ctx.now, id, EventKind::ActivityEnd { link: origin }));
                self.departing.insert(id, false);
            }
            Err(bad) => {
                tracing::warn!(agent = %id, link = %bad, time = ctx.now, "leg cannot be driven, agent stops");
                agent.abort()?;
                self.events.push(Event::new(ctx.now, id, EventKind::UnreachableDestination { link: bad }));
                self.unreachable += 1;
                self.archive(id);
            }
        }
        Ok(())
    }

    fn archive(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.remove(&id) {
            self.finished.push(agent);
        }
    }

    // ── Apply phase ───────────────────────────────────────────────────────

    /// Commit the resolved offers: pop accepted entities, run their
    /// transitions and package everything entering a link as a transfer.
    pub fn apply_phase(&mut self, out: LocalOutput, ctx: StepCtx<'_>) -> SimResult<Vec<Transfer>> {
        let mut transfers = Vec::new();

        for group in out.links {
            let queue = self
                .links
                .get_mut(&group.link)
                .ok_or_else(|| invariant(format!("{} offered foreign {}", self.id, group.link)))?;
            let left = queue.commit_departures(group.accepted, ctx.now)?;

            if group.refused {
                if let Some(Offer { agent, kind: OfferKind::Move { to }, .. }) = group.offers.get(group.accepted) {
                    self.held.insert(*agent, *to);
                }
            }

            for (entry, offer) in left.iter().zip(&group.offers) {
                if entry.agent != offer.agent {
                    return Err(invariant(format!(
                        "{} head changed between offer and commit: {} vs {}",
                        group.link, entry.agent, offer.agent
                    )));
                }
                match offer.kind {
                    OfferKind::Arrive => self.arrive(offer.agent, ctx)?,
                    OfferKind::Move { to } => {
                        let seq = offer
                            .seq
                            .ok_or_else(|| invariant(format!("accepted move of {} has no seq", offer.agent)))?;
                        self.held.remove(&offer.agent);
                        let mut agent = self
                            .agents
                            .remove(&offer.agent)
                            .ok_or_else(|| invariant(format!("{} vanished from {}", offer.agent, self.id)))?;
                        let (from, link) = agent.advance_link()?;
                        if link != to {
                            return Err(invariant(format!("{} offered {to} but routes to {link}", agent.id)));
                        }
                        self.events.push(Event::new(ctx.now, agent.id, EventKind::LinkEnter { from, link }));
                        transfers.push(Transfer { seq, from: Some(from), target: link, agent });
                    }
                }
            }
        }

        for dep in out.departures {
            let Some(seq) = dep.seq else {
                self.departing.insert(dep.agent, true);
                continue;
            };
            self.departing.remove(&dep.agent);
            let mut agent = self
                .agents
                .remove(&dep.agent)
                .ok_or_else(|| invariant(format!("departing {} vanished from {}", dep.agent, self.id)))?;
            let link = agent.enter_network()?;
            self.events.push(Event::new(ctx.now, agent.id, EventKind::Departure { link }));
            transfers.push(Transfer { seq, from: None, target: link, agent });
        }

        Ok(transfers)
    }

    /// Leave the network, start the next activity and either finish or
    /// schedule its end.
    fn arrive(&mut self, id: AgentId, ctx: StepCtx<'_>) -> SimResult<()> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| invariant(format!("arriving {id} not held by {}", self.id)))?;
        let link = agent.arrive()?;
        self.events.push(Event::new(ctx.now, id, EventKind::Arrival { link }));
        let link = agent.start_activity(ctx.now)?;
        self.events.push(Event::new(ctx.now, id, EventKind::ActivityStart { link }));

        match agent.activity_end() {
            None if agent.at_final_activity() => {
                agent.finish()?;
                self.events.push(Event::new(ctx.now, id, EventKind::AgentFinished));
                self.archive(id);
            }
            end => {
                let due = ctx.clock.tick_at_or_after(end.unwrap_or(ctx.now));
                self.wake.push(due.max(ctx.tick + 1), id);
            }
        }
        Ok(())
    }

    // ── Handoff phase ─────────────────────────────────────────────────────

    /// Insert incoming transfers in resolution order.
    pub fn handoff_phase(&mut self, mut inbox: Vec<Transfer>, ctx: StepCtx<'_>) -> SimResult<()> {
        inbox.sort_unstable_by_key(|t| t.seq);
        for t in inbox {
            let queue = self
                .links
                .get_mut(&t.target)
                .ok_or_else(|| invariant(format!("{} received transfer for foreign {}", self.id, t.target)))?;
            match queue.try_enter(t.agent.id, t.from, ctx.now, ctx.graph)? {
                Admission::Entered => {}
                Admission::Rejected(agent) => {
                    return Err(invariant(format!("{agent} refused by {} after reservation", t.target)));
                }
            }
            self.agents.insert(t.agent.id, t.agent);
        }
        Ok(())
    }
}
