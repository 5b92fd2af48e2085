//! Unit tests for qs-mobility.

use qs_core::{AgentId, Coord, LinkId, SimConfig};
use qs_network::{LinkSpec, NetworkBuilder, NetworkGraph};

use crate::{Admission, LinkQueue};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Chain 0 → 1 → 2 with L0 = 0→1 and L1 = 1→2, plus L2 = 0→1 parallel to L0.
///
/// L1: 100 m at 10 m/s (10 s), flow 1 per second, storage 2.
fn chain() -> NetworkGraph {
    let mut b = NetworkBuilder::new().capacity_period_secs(1.0);
    let n0 = b.add_node(Coord::new(0.0, 0.0));
    let n1 = b.add_node(Coord::new(100.0, 0.0));
    let n2 = b.add_node(Coord::new(200.0, 0.0));
    b.add_link(LinkSpec::new(n0, n1, 100.0, 10.0, 1.0).with_storage(5.0));
    b.add_link(LinkSpec::new(n1, n2, 100.0, 10.0, 1.0).with_storage(2.0));
    b.add_link(LinkSpec::new(n0, n1, 100.0, 10.0, 1.0));
    b.build().unwrap()
}

fn queue(net: &NetworkGraph, link: u32, config: &SimConfig) -> LinkQueue {
    LinkQueue::for_link(net, LinkId(link), config).unwrap()
}

// ── FlowBucket ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod flow_bucket {
    use crate::FlowBucket;

    #[test]
    fn fractional_rate_carries_remainder() {
        let mut b = FlowBucket::new(0.25);
        let mut released = 0;
        for _ in 0..8 {
            b.accrue();
            let n = b.budget();
            b.consume(n);
            released += n;
        }
        assert_eq!(released, 2, "0.25 per step over 8 steps");
    }

    #[test]
    fn uneven_rate_keeps_long_run_throughput() {
        let mut b = FlowBucket::new(2.5);
        let mut per_step = Vec::new();
        for _ in 0..4 {
            b.accrue();
            let n = b.budget();
            b.consume(n);
            per_step.push(n);
        }
        assert_eq!(per_step, vec![2, 3, 2, 3]);
        assert_eq!(b.max_per_step(), 3);
    }

    #[test]
    fn idle_link_cannot_bank_a_burst() {
        let mut slow = FlowBucket::new(0.5);
        for _ in 0..100 {
            slow.accrue();
        }
        assert_eq!(slow.credits(), 1.0);
        assert_eq!(slow.budget(), 1);

        let mut fast = FlowBucket::new(3.0);
        for _ in 0..10 {
            fast.accrue();
        }
        assert_eq!(fast.budget(), 3, "idle steps bank nothing");

        // Blocked after releasing one: the two unused credits do not add up.
        fast.consume(1);
        fast.accrue();
        assert_eq!(fast.budget(), 3);

        let mut unit = FlowBucket::new(1.0);
        unit.idle_accrue(50);
        assert_eq!(unit.budget(), 1);
        unit.accrue();
        assert_eq!(unit.budget(), 1);
    }

    #[test]
    fn idle_accrue_matches_stepping() {
        let mut stepped = FlowBucket::new(0.3);
        let mut jumped = stepped.clone();
        for _ in 0..2 {
            stepped.accrue();
        }
        jumped.idle_accrue(2);
        assert!((stepped.credits() - jumped.credits()).abs() < 1e-12);

        for _ in 0..5 {
            stepped.accrue();
        }
        jumped.idle_accrue(5);
        assert!((stepped.credits() - jumped.credits()).abs() < 1e-12);
        assert_eq!(jumped.credits(), 1.0);
    }
}

// ── LinkQueue ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod link_queue {
    use super::*;
    use crate::MobilityError;

    #[test]
    fn capacities_apply_factors() {
        let net = chain();
        let config = SimConfig { storage_capacity_factor: 0.5, ..SimConfig::default() };
        assert_eq!(queue(&net, 0, &config).storage_capacity(), 2); // floor(2.5)
        let tiny = SimConfig { storage_capacity_factor: 0.01, ..SimConfig::default() };
        assert_eq!(queue(&net, 1, &tiny).storage_capacity(), 1, "never below one");

        let config = SimConfig { flow_capacity_factor: 0.5, time_step_secs: 2, ..SimConfig::default() };
        assert_eq!(queue(&net, 1, &config).bucket().per_step(), 1.0);
    }

    #[test]
    fn storage_full_hands_entity_back() {
        let net = chain();
        let mut q = queue(&net, 1, &SimConfig::default());
        assert_eq!(q.try_enter(AgentId(0), Some(LinkId(0)), 0, &net).unwrap(), Admission::Entered);
        assert_eq!(q.try_enter(AgentId(1), Some(LinkId(0)), 0, &net).unwrap(), Admission::Entered);
        assert_eq!(
            q.try_enter(AgentId(2), Some(LinkId(0)), 0, &net).unwrap(),
            Admission::Rejected(AgentId(2))
        );
        assert_eq!(q.occupancy(), 2);
    }

    #[test]
    fn non_adjacent_entry_is_invariant_violation() {
        let net = chain();
        let mut q = queue(&net, 0, &SimConfig::default());
        let err = q.try_enter(AgentId(0), Some(LinkId(2)), 0, &net).unwrap_err();
        assert!(matches!(err, MobilityError::InvariantViolation { link: LinkId(0), .. }));
        assert!(q.is_empty());
    }

    #[test]
    fn free_flow_time_gates_exit() {
        let net = chain();
        let mut q = queue(&net, 1, &SimConfig::default());
        let _ = q.try_enter(AgentId(0), Some(LinkId(0)), 5, &net).unwrap();
        for t in 5..15 {
            q.begin_step();
            assert!(q.poll_departures(t).is_empty(), "t={t}");
        }
        q.begin_step();
        assert_eq!(q.poll_departures(15)[0].agent, AgentId(0));
    }

    #[test]
    fn departure_entry_leaves_next_step() {
        let net = chain();
        let mut q = queue(&net, 1, &SimConfig::default());
        let _ = q.try_enter(AgentId(0), None, 5, &net).unwrap();
        q.begin_step();
        assert!(q.poll_departures(5).is_empty());
        assert_eq!(q.poll_departures(6).len(), 1);
    }

    #[test]
    fn head_of_line_blocks_followers() {
        let net = chain();
        let mut q = queue(&net, 0, &SimConfig::default());
        let _ = q.try_enter(AgentId(0), None, 10, &net).unwrap(); // ready at 11
        let _ = q.try_enter(AgentId(1), None, 0, &net).unwrap(); // ready at 1, but behind
        q.begin_step();
        assert!(q.poll_departures(5).is_empty());
    }

    #[test]
    fn flow_budget_cuts_the_offer() {
        let net = chain();
        let mut q = queue(&net, 0, &SimConfig::default()); // 1 per step
        for i in 0..3 {
            let _ = q.try_enter(AgentId(i), None, 0, &net).unwrap();
        }
        q.begin_step();
        let offer = q.poll_departures(1);
        assert_eq!(offer.len(), 1);
        assert_eq!(offer[0].agent, AgentId(0));
        assert_eq!(q.occupancy(), 3, "polling does not remove");

        let left = q.commit_departures(1, 1).unwrap();
        assert_eq!(left[0].agent, AgentId(0));
        assert_eq!(q.occupancy(), 2);
        assert!(q.commit_departures(1, 1).is_err(), "credit already spent");
    }

    #[test]
    fn blocked_link_releases_one_step_of_flow() {
        let net = chain();
        let mut q = queue(&net, 0, &SimConfig::default()); // 1 per step
        for i in 0..4 {
            let _ = q.try_enter(AgentId(i), None, 0, &net).unwrap();
        }
        // Ready from t=1, but held downstream until t=10.
        for _ in 0..10 {
            q.begin_step();
        }
        for t in 10..14 {
            q.begin_step();
            assert_eq!(q.poll_departures(t).len(), 1, "t={t}");
            assert_eq!(q.commit_departures(1, t).unwrap().len(), 1);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn over_commit_rejected() {
        let net = chain();
        let mut q = queue(&net, 0, &SimConfig::default());
        q.begin_step();
        assert!(matches!(
            q.commit_departures(1, 100),
            Err(MobilityError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn step_start_snapshot() {
        let net = chain();
        let mut q = queue(&net, 1, &SimConfig::default());
        let _ = q.try_enter(AgentId(0), None, 0, &net).unwrap();
        q.begin_step();
        let _ = q.try_enter(AgentId(1), None, 0, &net).unwrap();
        assert_eq!(q.occupancy_at_step_start(), 1);
        assert_eq!(q.free_at_step_start(), 1);
        assert_eq!(q.occupancy(), 2);
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Whatever the arrival pattern, occupancy stays within storage, no
        /// step releases more than its whole-entity flow, and releases never
        /// exceed accrued flow.
        #[test]
        fn storage_and_flow_bounds(
            arrivals in proptest::collection::vec(0usize..4, 1..60),
            flow_factor in 0.1f64..3.0,
        ) {
            let net = chain();
            let config = SimConfig { flow_capacity_factor: flow_factor, ..SimConfig::default() };
            let mut q = queue(&net, 1, &config);
            let mut next_agent = 0u32;
            let mut released = 0usize;

            for (t, &n) in arrivals.iter().enumerate() {
                let t = t as u64;
                q.begin_step();
                let offer = q.poll_departures(t);
                prop_assert!(offer.len() <= q.bucket().max_per_step());
                prop_assert!(offer.len() as f64 <= (flow_factor.ceil()).max(1.0));
                released += q.commit_departures(offer.len(), t).unwrap().len();
                for _ in 0..n {
                    let _ = q.try_enter(AgentId(next_agent), Some(LinkId(0)), t, &net).unwrap();
                    next_agent += 1;
                    prop_assert!(q.occupancy() <= q.storage_capacity());
                }
            }
            let steps = arrivals.len() as f64;
            prop_assert!(released as f64 <= flow_factor * steps + 1e-9);
        }
    }
}
