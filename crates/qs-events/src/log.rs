//! `EventLog`: in-memory recorder, mainly for tests and post-run analysis.

use qs_core::{AgentId, LinkId};

use crate::{Event, EventHandler};

/// A simple wrapper around `Vec<Event>` with query helpers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_at(&self, time: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.time == time).collect()
    }

    pub fn events_for_agent(&self, agent: AgentId) -> Vec<&Event> {
        self.events.iter().filter(|e| e.agent == agent).collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind.event_type() == event_type).collect()
    }

    pub fn events_on_link(&self, link: LinkId) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind.link() == Some(link)).collect()
    }

    /// Feed the recorded stream into `handler`, with `on_step_end` at every
    /// timestamp change and `on_run_end` after the last event.
    pub fn replay(&self, handler: &mut dyn EventHandler) {
        let mut current: Option<u64> = None;
        for event in &self.events {
            if let Some(t) = current.filter(|&t| t != event.time) {
                handler.on_step_end(t);
            }
            current = Some(event.time);
            handler.handle_event(event);
        }
        if let Some(t) = current {
            handler.on_step_end(t);
            handler.on_run_end(t);
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventHandler for EventLog {
    fn handle_event(&mut self, event: &Event) {
        self.log(*event);
    }
}
