//! Cross-partition exchange: the offers partitions publish after the local
//! phase, the sequential resolution that decides them, and the handoff
//! messages that carry accepted agents to their next link.
//!
//! # Resolution order
//!
//! Offers are decided one at a time in a global order that does not depend
//! on how the network is partitioned:
//!
//! 1. link offers by source link id, then queue position;
//! 2. departure offers by agent id.
//!
//! Each accepted move or departure reserves one storage slot on its target
//! link and receives the next sequence number.  Targets start the step with
//!
//! ```text
//! slots = storage_capacity - occupancy_at_step_start + certain_exits
//! ```
//!
//! where `certain_exits` is the leading run of arrivals on that link's own
//! offer list: those leave this step whatever else happens.  The first
//! refused move on a link blocks everything behind it (FIFO).
//!
//! A refused move or departure is held where it is and retried next step.
//! Its first refusal for a given target becomes a [`CapacityWarning`].

use qs_agent::Agent;
use qs_core::{AgentId, LinkId};

use crate::report::CapacityWarning;

#[cfg(feature = "fx-hash")]
type SlotMap<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fx-hash"))]
type SlotMap<K, V> = std::collections::HashMap<K, V>;

// ── Offers ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum OfferKind {
    /// Continue onto `to`.
    Move { to: LinkId },
    /// Leave the network at the end of the leg.
    Arrive,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct Offer {
    pub agent:         AgentId,
    pub kind:          OfferKind,
    /// No earlier refusal for this move.
    pub first_attempt: bool,
    /// Set for accepted moves.
    pub seq:           Option<u64>,
}

/// The ready head prefix of one link.
#[derive(Debug)]
pub(crate) struct LinkOffers {
    pub link:          LinkId,
    pub offers:        Vec<Offer>,
    pub certain_exits: usize,
    /// Length of the accepted prefix of `offers`, filled in by [`resolve`].
    pub accepted:      usize,
    /// Set by [`resolve`] when the offer right after the accepted prefix was
    /// refused for lack of room on its target.
    pub refused:       bool,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct DepartureOffer {
    pub agent:         AgentId,
    pub link:          LinkId,
    /// No earlier refusal for this departure.
    pub first_attempt: bool,
    pub seq:           Option<u64>,
}

/// Everything one partition publishes after its local phase.
#[derive(Debug, Default)]
pub(crate) struct LocalOutput {
    pub links:      Vec<LinkOffers>,
    pub departures: Vec<DepartureOffer>,
}

// ── Handoff ───────────────────────────────────────────────────────────────────

/// An agent on its way into `target`.  Delivered to the partition owning
/// `target`, which inserts its inbox in `seq` order.
#[derive(Debug)]
pub(crate) struct Transfer {
    pub seq:    u64,
    /// Link being left; `None` for an agent entering traffic.
    pub from:   Option<LinkId>,
    pub target: LinkId,
    pub agent:  Agent,
}

// ── Resolution ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub moves:              usize,
    pub arrivals:           usize,
    pub departures:         usize,
    pub blocked_links:      usize,
    pub blocked_departures: usize,
    pub warnings:           Vec<CapacityWarning>,
}

/// Decide every offer in `outputs` in global order, recording the decisions
/// in place (`LinkOffers::accepted`, `seq` fields).
///
/// `free_at_start(link)` must return the link's free storage as of the start
/// of the step.
pub(crate) fn resolve(
    outputs: &mut [LocalOutput],
    free_at_start: impl Fn(LinkId) -> usize,
    now: u64,
) -> Resolution {
    let mut certain: SlotMap<LinkId, usize> = SlotMap::default();
    let mut link_order: Vec<(LinkId, usize, usize)> = Vec::new();
    let mut dep_order: Vec<(AgentId, usize, usize)> = Vec::new();
    for (p, out) in outputs.iter().enumerate() {
        for (g, group) in out.links.iter().enumerate() {
            if group.certain_exits > 0 {
                certain.insert(group.link, group.certain_exits);
            }
            link_order.push((group.link, p, g));
        }
        for (d, dep) in out.departures.iter().enumerate() {
            dep_order.push((dep.agent, p, d));
        }
    }
    link_order.sort_unstable();
    dep_order.sort_unstable();

    let mut slots: SlotMap<LinkId, usize> = SlotMap::default();
    let mut reserve = |link: LinkId| -> bool {
        let free = slots.entry(link).or_insert_with(|| {
            free_at_start(link) + certain.get(&link).copied().unwrap_or(0)
        });
        if *free == 0 {
            return false;
        }
        *free -= 1;
        true
    };

    let mut res = Resolution::default();
    let mut seq = 0u64;

    for (_, p, g) in link_order {
        let group = &mut outputs[p].links[g];
        let mut accepted = 0;
        for offer in group.offers.iter_mut() {
            match offer.kind {
                OfferKind::Arrive => res.arrivals += 1,
                OfferKind::Move { to } => {
                    if !reserve(to) {
                        res.blocked_links += 1;
                        group.refused = true;
                        if offer.first_attempt {
                            tracing::debug!(from = %group.link, %to, agent = %offer.agent, time = now, "move held: next link full");
                            res.warnings.push(CapacityWarning { time: now, agent: offer.agent, link: to });
                        }
                        break;
                    }
                    offer.seq = Some(seq);
                    seq += 1;
                    res.moves += 1;
                }
            }
            accepted += 1;
        }
        group.accepted = accepted;
    }

    for (agent, p, d) in dep_order {
        let dep = &mut outputs[p].departures[d];
        if reserve(dep.link) {
            dep.seq = Some(seq);
            seq += 1;
            res.departures += 1;
        } else {
            res.blocked_departures += 1;
            if dep.first_attempt {
                tracing::debug!(%agent, link = %dep.link, time = now, "departure held: first link full");
                res.warnings.push(CapacityWarning { time: now, agent, link: dep.link });
            }
        }
    }
    res
}
