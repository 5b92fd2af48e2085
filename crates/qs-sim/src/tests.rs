//! Unit tests for qs-sim.

use qs_agent::{Activity, Agent, Itinerary, Leg, Segment};
use qs_core::{AgentId, Coord, LinkId, NodeId, SimConfig};
use qs_events::{Event, EventBus, EventHandler, EventKind, EventLog};
use qs_network::{LinkSpec, NetworkBuilder, NetworkGraph};

use crate::{NoopObserver, SimBuilder, SimReport};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Straight line of links `i: node i → node i+1` at 10 m/s.  Each entry is
/// `(length_m, flow per second, storage)`.
fn line(links: &[(f64, f64, f64)]) -> NetworkGraph {
    let mut b = NetworkBuilder::new().capacity_period_secs(1.0);
    for i in 0..=links.len() {
        b.add_node(Coord::new(i as f64 * 100.0, 0.0));
    }
    for (i, &(length, flow, storage)) in links.iter().enumerate() {
        let i = i as u32;
        b.add_link(LinkSpec::new(NodeId(i), NodeId(i + 1), length, 10.0, flow).with_storage(storage));
    }
    b.build().unwrap()
}

/// Ring of `n` nodes with link `i: node i → node (i+1) % n`.
fn ring(lengths: &[f64], flows: &[f64], storages: &[f64]) -> NetworkGraph {
    let n = lengths.len();
    let mut b = NetworkBuilder::new().capacity_period_secs(3_600.0);
    for i in 0..n {
        let angle = i as f64 / n as f64 * std::f64::consts::TAU;
        b.add_node(Coord::new(500.0 * angle.cos(), 500.0 * angle.sin()));
    }
    for i in 0..n {
        let spec = LinkSpec::new(NodeId(i as u32), NodeId(((i + 1) % n) as u32), lengths[i], 10.0, flows[i])
            .with_storage(storages[i]);
        b.add_link(spec);
    }
    b.build().unwrap()
}

/// Home on `route[0]` until `leave`, drive `route`, stay at the last link.
fn trip(id: u32, leave: u64, route: &[u32]) -> Agent {
    let route: Vec<LinkId> = route.iter().map(|&l| LinkId(l)).collect();
    let (first, last) = (route[0], route[route.len() - 1]);
    let itinerary = Itinerary::new(vec![
        Segment::Activity(Activity::new("home", first).ending_at(leave)),
        Segment::Leg(Leg::car(route)),
        Segment::Activity(Activity::new("work", last)),
    ])
    .unwrap();
    Agent::new(AgentId(id), itinerary, 0)
}

fn config(partitions: usize) -> SimConfig {
    SimConfig { partition_count: partitions, ..SimConfig::default() }
}

fn run_logged(config: SimConfig, graph: NetworkGraph, agents: Vec<Agent>) -> (SimReport, EventLog) {
    let mut sim = SimBuilder::new(config, graph).agents(agents).build().unwrap();
    let mut log = EventLog::new();
    let report = {
        let mut bus = EventBus::new(vec![&mut log as &mut dyn EventHandler]);
        sim.run(&mut bus, &mut NoopObserver).unwrap()
    };
    (report, log)
}

/// Time of `agent`'s first event of `event_type` on `link`.
fn time_of(log: &EventLog, agent: u32, event_type: &str, link: u32) -> Option<u64> {
    log.events_for_agent(AgentId(agent))
        .into_iter()
        .find(|e| e.kind.event_type() == event_type && e.kind.link() == Some(LinkId(link)))
        .map(|e| e.time)
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scenarios {
    use super::*;
    use crate::{CapacityWarning, EndReason};

    #[test]
    fn single_slot_link_admits_one_departure_per_step() {
        // 10 m at 10 m/s, 1 per second, room for one.
        let net = line(&[(10.0, 1.0, 1.0)]);
        let (report, log) = run_logged(config(1), net, vec![trip(0, 0, &[0]), trip(1, 0, &[0])]);

        assert_eq!(time_of(&log, 0, "departure", 0), Some(0));
        assert_eq!(time_of(&log, 1, "departure", 0), Some(1));
        assert_eq!(time_of(&log, 0, "arrival", 0), Some(1));
        assert_eq!(time_of(&log, 1, "arrival", 0), Some(2));

        assert_eq!(report.end, EndReason::AllFinished);
        assert_eq!(report.final_time, 2);
        assert_eq!(report.steps, 3);
        assert_eq!(report.finished_agents, 2);
        assert_eq!(report.events_emitted, log.len() as u64);
        assert_eq!(
            report.capacity_warnings,
            vec![CapacityWarning { time: 0, agent: AgentId(1), link: LinkId(0) }],
            "warned once although held for one step"
        );
    }

    #[test]
    fn full_link_holds_upstream_queue() {
        // L1 takes 10 s, stores two and lets one out per second; L0 and L2
        // are roomy.
        let net = line(&[(10.0, 3.0, 10.0), (100.0, 1.0, 2.0), (100.0, 3.0, 10.0)]);
        let agents = (0..3).map(|i| trip(i, 0, &[0, 1, 2])).collect();
        let (report, log) = run_logged(config(1), net, agents);

        assert_eq!(time_of(&log, 0, "entered link", 1), Some(1));
        assert_eq!(time_of(&log, 1, "entered link", 1), Some(1));
        // Both occupants are ready at t=11 but the flow gate passes one per
        // step.
        assert_eq!(time_of(&log, 0, "entered link", 2), Some(11));
        assert_eq!(time_of(&log, 1, "entered link", 2), Some(12));
        // Third waits on L0 until the first occupant has left; the slot is
        // free from the next step.
        assert_eq!(time_of(&log, 2, "entered link", 1), Some(12));
        assert_eq!(report.end, EndReason::AllFinished);
        assert_eq!(
            report.capacity_warnings,
            vec![CapacityWarning { time: 1, agent: AgentId(2), link: LinkId(1) }],
            "held move warned once, on its first refusal"
        );
    }

    #[test]
    fn flow_capacity_gates_roomy_link() {
        // L0 lets one out per second and has room for ten.
        let net = line(&[(10.0, 1.0, 10.0), (100.0, 3.0, 10.0)]);
        let agents = (0..3).map(|i| trip(i, 0, &[0, 1])).collect();
        let (report, log) = run_logged(config(1), net, agents);

        let left: Vec<Option<u64>> = (0..3).map(|i| time_of(&log, i, "entered link", 1)).collect();
        assert_eq!(left, vec![Some(1), Some(2), Some(3)]);
        assert!(report.capacity_warnings.is_empty(), "flow-held entities are not refused");
    }

    #[test]
    fn idle_link_does_not_burst() {
        // Nobody is ready on L0 until t=5; the idle steps bank no extra exits.
        let net = line(&[(10.0, 1.0, 10.0), (100.0, 3.0, 10.0)]);
        let agents = (0..2).map(|i| trip(i, 4, &[0, 1])).collect();
        let (_, log) = run_logged(config(1), net, agents);

        assert_eq!(time_of(&log, 0, "entered link", 1), Some(5));
        assert_eq!(time_of(&log, 1, "entered link", 1), Some(6));
    }

    #[test]
    fn arrivals_free_room_in_the_same_step() {
        // Same bottleneck, but L1 is the destination: occupants leave the
        // network instead of moving on, so the waiting agent gets in at once.
        let net = line(&[(10.0, 3.0, 10.0), (100.0, 1.0, 2.0)]);
        let agents = (0..3).map(|i| trip(i, 0, &[0, 1])).collect();
        let (_, log) = run_logged(config(1), net, agents);

        assert_eq!(time_of(&log, 0, "arrival", 1), Some(11));
        assert_eq!(time_of(&log, 2, "entered link", 1), Some(11));
    }

    #[test]
    fn missing_link_stops_only_that_agent() {
        let net = line(&[(10.0, 1.0, 5.0), (10.0, 1.0, 5.0)]);
        let agents = vec![trip(0, 0, &[0, 1]), trip(1, 0, &[0, 99]), trip(2, 5, &[0, 1])];
        let (report, log) = run_logged(config(1), net, agents);

        let stuck = log.events_of_type("stuck");
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].agent, AgentId(1));
        assert_eq!(stuck[0].kind, EventKind::UnreachableDestination { link: LinkId(99) });
        assert!(time_of(&log, 1, "departure", 0).is_none());

        assert!(time_of(&log, 0, "arrival", 1).is_some());
        assert!(time_of(&log, 2, "arrival", 1).is_some());
        assert_eq!(report.end, EndReason::AllFinished);
        assert_eq!(report.unreachable_agents, 1);
        assert_eq!(report.finished_agents, 3);
    }

    #[test]
    fn disconnected_route_is_unreachable() {
        let net = line(&[(10.0, 1.0, 5.0), (10.0, 1.0, 5.0), (10.0, 1.0, 5.0)]);
        // L0 → L2 skips L1.
        let (report, log) = run_logged(config(1), net, vec![trip(0, 0, &[0, 2])]);
        assert_eq!(
            log.events()[0].kind,
            EventKind::UnreachableDestination { link: LinkId(2) }
        );
        assert_eq!(report.unreachable_agents, 1);
    }

    #[test]
    fn max_time_ends_the_run() {
        // 1000 m at 10 m/s: 100 s on the link.
        let net = line(&[(10.0, 1.0, 5.0), (1_000.0, 1.0, 5.0)]);
        let cfg = SimConfig { max_sim_time_secs: 20, ..config(1) };
        let (report, _) = run_logged(cfg, net, vec![trip(0, 0, &[0, 1])]);

        assert_eq!(report.end, EndReason::MaxTimeReached { unfinished: 1 });
        assert_eq!(report.final_time, 20);
        assert_eq!(report.steps, 21);
    }

    #[test]
    fn idle_time_is_skipped() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let (report, log) = run_logged(config(1), net, vec![trip(0, 3_600, &[0])]);

        assert_eq!(log.events()[0].time, 3_600);
        assert_eq!(report.steps, 2);
        assert_eq!(report.final_time, 3_601);
    }

    #[test]
    fn open_ended_first_activity_finishes_immediately() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let agent = Agent::new(AgentId(0), Itinerary::stay(Activity::new("home", LinkId(0))), 0);
        let (report, log) = run_logged(config(1), net, vec![agent]);
        assert_eq!(log.events(), &[Event::new(0, AgentId(0), EventKind::AgentFinished)]);
        assert_eq!(report.end, EndReason::AllFinished);
    }

    #[test]
    fn later_activity_end_is_honoured() {
        let net = line(&[(10.0, 1.0, 5.0)]);
        let itinerary = Itinerary::new(vec![
            Segment::Activity(Activity::new("home", LinkId(0)).ending_at(0)),
            Segment::Leg(Leg::car(vec![LinkId(0)])),
            Segment::Activity(Activity::new("shop", LinkId(0)).lasting(30)),
            Segment::Leg(Leg::car(vec![LinkId(0)])),
            Segment::Activity(Activity::new("home", LinkId(0))),
        ])
        .unwrap();
        let (_, log) = run_logged(config(1), net, vec![Agent::new(AgentId(0), itinerary, 0)]);

        let ends: Vec<u64> = log.events_of_type("actend").iter().map(|e| e.time).collect();
        // Arrive at t=1, shop for 30 s.
        assert_eq!(ends, vec![0, 31]);
    }
}

// ── Run control ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod run_control {
    use super::*;
    use crate::{CancelToken, EndReason, SimObserver, StepStats};

    struct CancelAt {
        token: CancelToken,
        time:  u64,
        seen:  Vec<StepStats>,
    }

    impl SimObserver for CancelAt {
        fn on_step_end(&mut self, stats: &StepStats) {
            self.seen.push(*stats);
            if stats.time == self.time {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn cancel_between_steps() {
        let net = line(&[(10.0, 1.0, 5.0), (1_000.0, 1.0, 5.0)]);
        let token = CancelToken::new();
        let mut sim = SimBuilder::new(config(1), net)
            .agents(vec![trip(0, 0, &[0, 1])])
            .cancel_token(token.clone())
            .build()
            .unwrap();
        let mut observer = CancelAt { token, time: 3, seen: Vec::new() };
        let report = sim.run(&mut EventBus::empty(), &mut observer).unwrap();

        assert_eq!(report.end, EndReason::Cancelled);
        assert_eq!(report.steps, 4);
        assert_eq!(report.final_time, 3);
        assert_eq!(observer.seen.len(), 4);
        assert_eq!(observer.seen[1].link_moves, 1, "L0 → L1 at t=1");
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let net = line(&[(10.0, 1.0, 5.0)]);
        let token = CancelToken::new();
        token.cancel();
        let mut sim = SimBuilder::new(config(1), net)
            .agents(vec![trip(0, 0, &[0])])
            .cancel_token(token)
            .build()
            .unwrap();
        let report = sim.run(&mut EventBus::empty(), &mut NoopObserver).unwrap();
        assert_eq!(report.end, EndReason::Cancelled);
        assert_eq!(report.steps, 0);
        assert_eq!(report.final_time, 0);
    }

    #[test]
    fn step_stats_track_the_network() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let mut sim = SimBuilder::new(config(1), net)
            .agents(vec![trip(0, 0, &[0]), trip(1, 0, &[0])])
            .build()
            .unwrap();

        #[derive(Default)]
        struct Collect(Vec<StepStats>);
        impl SimObserver for Collect {
            fn on_step_end(&mut self, stats: &StepStats) {
                self.0.push(*stats);
            }
        }
        let mut stats = Collect::default();
        sim.run_steps(2, &mut EventBus::empty(), &mut stats).unwrap();

        let first = stats.0[0];
        assert_eq!((first.departures, first.blocked_departures), (1, 1));
        assert_eq!((first.en_route, first.departing), (1, 1));
        let second = stats.0[1];
        assert_eq!((second.arrivals, second.departures, second.finished_total), (1, 1, 1));
        assert_eq!(sim.link_occupancy(LinkId(0)), 1);
        assert_eq!(sim.live_agents(), 1);
        assert_eq!(sim.clock().now_secs(), 2);
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use qs_network::Partitioning;

    use super::*;
    use crate::SimError;

    #[test]
    fn duplicate_agent_ids_rejected() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let err = SimBuilder::new(config(1), net)
            .agents(vec![trip(3, 0, &[0]), trip(3, 5, &[0])])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn agent_mid_itinerary_rejected() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let mut agent = trip(0, 0, &[0]);
        agent.end_activity().unwrap();
        let err = SimBuilder::new(config(1), net).agents(vec![agent]).build().err().unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn invalid_config_rejected() {
        let net = line(&[(10.0, 1.0, 1.0)]);
        let cfg = SimConfig { time_step_secs: 0, ..SimConfig::default() };
        let err = SimBuilder::new(cfg, net).build().err().unwrap();
        assert!(matches!(err, SimError::Core(_)));
    }

    #[test]
    fn partitioning_count_must_match() {
        let net = line(&[(10.0, 1.0, 1.0), (10.0, 1.0, 1.0)]);
        let single = Partitioning::single(&net);
        let err = SimBuilder::new(config(2), net).partitioning(single).build().err().unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn links_and_agents_reach_their_owners() {
        let net = ring(&[100.0; 8], &[3_600.0; 8], &[5.0; 8]);
        let sim = SimBuilder::new(config(4), net)
            .agents(vec![trip(0, 10, &[0, 1]), trip(1, 10, &[5, 6])])
            .build()
            .unwrap();
        assert_eq!(sim.partitioning().count(), 4);
        for l in 0..8 {
            assert!(sim.link_queue(LinkId(l)).is_some(), "L{l} has an owner");
        }
        let ids: Vec<AgentId> = sim.agents().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AgentId(0), AgentId(1)]);
        assert!(sim.agent(AgentId(1)).is_some());
        assert_eq!(sim.live_agents(), 2);
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    /// A ring plus commuters who drive `k` links forward to work and carry on
    /// round the ring back home.
    #[derive(Clone, Debug)]
    struct Scenario {
        lengths:  Vec<f64>,
        flows:    Vec<f64>,
        storages: Vec<f64>,
        trips:    Vec<(usize, usize, u64, u64)>,
    }

    impl Scenario {
        fn graph(&self) -> NetworkGraph {
            ring(&self.lengths, &self.flows, &self.storages)
        }

        fn agents(&self) -> Vec<Agent> {
            let n = self.lengths.len();
            self.trips
                .iter()
                .enumerate()
                .map(|(id, &(home, k, leave, work_secs))| {
                    let link = |i: usize| LinkId(((home + i) % n) as u32);
                    let out: Vec<LinkId> = (0..=k).map(link).collect();
                    let back: Vec<LinkId> = (k..=n).map(link).collect();
                    let itinerary = Itinerary::new(vec![
                        Segment::Activity(Activity::new("home", link(0)).ending_at(leave)),
                        Segment::Leg(Leg::car(out)),
                        Segment::Activity(Activity::new("work", link(k)).lasting(work_secs)),
                        Segment::Leg(Leg::car(back)),
                        Segment::Activity(Activity::new("home", link(0))),
                    ])
                    .unwrap();
                    Agent::new(AgentId(id as u32), itinerary, 0)
                })
                .collect()
        }

        fn config(&self, partitions: usize) -> SimConfig {
            SimConfig { partition_count: partitions, max_sim_time_secs: 2_000, ..SimConfig::default() }
        }
    }

    fn scenario() -> impl Strategy<Value = Scenario> {
        (4usize..10).prop_flat_map(|n| {
            (
                proptest::collection::vec(20.0f64..150.0, n),
                proptest::collection::vec(600.0f64..3_600.0, n),
                proptest::collection::vec(1.0f64..4.0, n),
                proptest::collection::vec((0..n, 1..n, 0u64..60, 0u64..60), 1..25),
            )
                .prop_map(|(lengths, flows, storages, trips)| Scenario {
                    lengths,
                    flows,
                    storages,
                    trips,
                })
        })
    }

    fn run(s: &Scenario, partitions: usize) -> (SimReport, EventLog) {
        run_logged(s.config(partitions), s.graph(), s.agents())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// The event stream does not depend on how the network is split.
        #[test]
        fn partition_count_does_not_change_results(s in scenario()) {
            let (r1, log1) = run(&s, 1);
            for k in [2, 4] {
                let (rk, logk) = run(&s, k);
                prop_assert_eq!(log1.events(), logk.events());
                prop_assert_eq!(r1.end, rk.end);
                prop_assert_eq!(r1.final_time, rk.final_time);
                prop_assert_eq!(r1.steps, rk.steps);
                prop_assert_eq!(&r1.capacity_warnings, &rk.capacity_warnings);
            }
        }

        /// Two runs of the same input are identical.
        #[test]
        fn repeated_runs_identical(s in scenario()) {
            let (ra, a) = run(&s, 2);
            let (rb, b) = run(&s, 2);
            prop_assert_eq!(a.events(), b.events());
            prop_assert_eq!(ra, rb);
        }

        /// Storage is never exceeded, itineraries only move forward and
        /// delivered time never goes back.
        #[test]
        fn step_invariants(s in scenario()) {
            let graph = s.graph();
            let links = graph.link_count() as u32;
            let mut sim = SimBuilder::new(s.config(2), graph).agents(s.agents()).build().unwrap();
            let mut log = EventLog::new();
            let mut segments = vec![0usize; s.trips.len()];
            {
                let mut bus = EventBus::new(vec![&mut log as &mut dyn EventHandler]);
                for _ in 0..600 {
                    if sim.live_agents() == 0 {
                        break;
                    }
                    sim.run_steps(1, &mut bus, &mut NoopObserver).unwrap();
                    for l in 0..links {
                        let q = sim.link_queue(LinkId(l)).unwrap();
                        prop_assert!(q.occupancy() <= q.storage_capacity(), "L{} over storage", l);
                    }
                    for agent in sim.agents() {
                        let seg = agent.segment_index();
                        prop_assert!(seg >= segments[agent.id.index()]);
                        segments[agent.id.index()] = seg;
                    }
                }
            }
            prop_assert!(log.events().windows(2).all(|w| w[0].time <= w[1].time));
        }
    }
}
