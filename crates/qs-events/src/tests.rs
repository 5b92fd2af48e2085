//! Unit tests for qs-events.

use qs_core::{AgentId, LinkId};

use crate::{Event, EventKind};

fn ev(time: u64, agent: u32, kind: EventKind) -> Event {
    Event::new(time, AgentId(agent), kind)
}

#[cfg(test)]
mod ordering {
    use super::*;
    use crate::merge_events;

    #[test]
    fn priorities_follow_transition_order() {
        let kinds = [
            EventKind::ActivityEnd { link: LinkId(0) },
            EventKind::Departure { link: LinkId(0) },
            EventKind::LinkEnter { from: LinkId(0), link: LinkId(1) },
            EventKind::Arrival { link: LinkId(1) },
            EventKind::ActivityStart { link: LinkId(1) },
            EventKind::AgentFinished,
        ];
        assert!(kinds.windows(2).all(|w| w[0].priority() < w[1].priority()));
    }

    #[test]
    fn merge_is_independent_of_batch_split() {
        let a = vec![
            ev(5, 2, EventKind::Arrival { link: LinkId(3) }),
            ev(5, 0, EventKind::LinkEnter { from: LinkId(1), link: LinkId(2) }),
        ];
        let b = vec![
            ev(5, 2, EventKind::ActivityStart { link: LinkId(3) }),
            ev(5, 1, EventKind::Departure { link: LinkId(7) }),
            ev(5, 1, EventKind::ActivityEnd { link: LinkId(7) }),
        ];
        let one = merge_events(vec![a.clone(), b.clone()]);
        let two = merge_events(vec![b, a]);
        assert_eq!(one, two);

        let order: Vec<(u32, &str)> =
            one.iter().map(|e| (e.agent.0, e.kind.event_type())).collect();
        assert_eq!(
            order,
            vec![
                (0, "entered link"),
                (1, "actend"),
                (1, "departure"),
                (2, "arrival"),
                (2, "actstart"),
            ]
        );
    }

    #[test]
    fn display_names_link() {
        let e = ev(12, 4, EventKind::Arrival { link: LinkId(9) });
        assert_eq!(e.to_string(), "t=12 AgentId(4) arrival LinkId(9)");
        assert_eq!(ev(0, 1, EventKind::AgentFinished).kind.link(), None);
    }
}

#[cfg(test)]
mod bus {
    use super::*;
    use crate::{EventBus, EventError, EventHandler, EventLog};

    #[derive(Default)]
    struct StepCounter {
        steps:    Vec<u64>,
        run_end:  Option<u64>,
        received: usize,
    }

    impl EventHandler for StepCounter {
        fn handle_event(&mut self, _event: &Event) {
            self.received += 1;
        }
        fn on_step_end(&mut self, time: u64) {
            self.steps.push(time);
        }
        fn on_run_end(&mut self, final_time: u64) {
            self.run_end = Some(final_time);
        }
    }

    #[test]
    fn delivers_merged_to_every_handler() {
        let mut log = EventLog::new();
        let mut counter = StepCounter::default();
        {
            let mut bus = EventBus::new(vec![&mut log as &mut dyn EventHandler, &mut counter]);
            let n = bus
                .finalize_step(
                    3,
                    vec![
                        vec![ev(3, 1, EventKind::AgentFinished)],
                        vec![ev(3, 0, EventKind::AgentFinished)],
                    ],
                )
                .unwrap();
            assert_eq!(n, 2);
            bus.finalize_step(4, vec![]).unwrap();
            bus.finish(4);
            assert_eq!(bus.emitted(), 2);
            assert_eq!(bus.last_time(), Some(3));
        }
        assert_eq!(log.events()[0].agent, AgentId(0));
        assert_eq!(counter.received, 2);
        assert_eq!(counter.steps, vec![3, 4]);
        assert_eq!(counter.run_end, Some(4));
    }

    #[test]
    fn older_events_rejected() {
        let mut log = EventLog::new();
        let mut bus = EventBus::new(vec![&mut log as &mut dyn EventHandler]);
        bus.finalize_step(10, vec![vec![ev(10, 0, EventKind::AgentFinished)]]).unwrap();
        let err = bus
            .finalize_step(9, vec![vec![ev(9, 1, EventKind::AgentFinished)]])
            .unwrap_err();
        assert!(matches!(err, EventError::OutOfOrder { last: 10, got: 9 }));
        drop(bus);
        assert_eq!(log.len(), 1, "rejected step not delivered");
    }

    #[test]
    fn replay_reproduces_stream_and_step_boundaries() {
        let mut log = EventLog::new();
        log.log(ev(1, 0, EventKind::ActivityEnd { link: LinkId(0) }));
        log.log(ev(1, 0, EventKind::Departure { link: LinkId(0) }));
        log.log(ev(4, 0, EventKind::Arrival { link: LinkId(0) }));

        let mut copy = EventLog::new();
        log.replay(&mut copy);
        assert_eq!(copy, log);

        let mut counter = StepCounter::default();
        log.replay(&mut counter);
        assert_eq!(counter.steps, vec![1, 4]);
        assert_eq!(counter.run_end, Some(4));
    }

    #[test]
    fn log_queries() {
        let mut log = EventLog::new();
        log.log(ev(1, 0, EventKind::Departure { link: LinkId(2) }));
        log.log(ev(2, 1, EventKind::Departure { link: LinkId(3) }));
        log.log(ev(2, 0, EventKind::LinkEnter { from: LinkId(2), link: LinkId(3) }));
        assert_eq!(log.events_at(2).len(), 2);
        assert_eq!(log.events_for_agent(AgentId(0)).len(), 2);
        assert_eq!(log.events_of_type("departure").len(), 2);
        assert_eq!(log.events_on_link(LinkId(3)).len(), 2);
        log.clear();
        assert!(log.is_empty());
    }
}
