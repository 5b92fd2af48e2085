//! `EventBus`: ordered delivery to an explicit subscriber list.
//!
//! Handlers are registered once, before the run, and receive every event in
//! the same order on every run.  The simulation hands each step's
//! per-partition batches to [`EventBus::finalize_step`], which merges them,
//! checks that time never goes backwards, and delivers.

use crate::event::merge_events;
use crate::{Event, EventError, EventResult};

/// Subscriber to the event stream.
///
/// Only `handle_event` is required; the step and run hooks default to no-ops.
pub trait EventHandler {
    fn handle_event(&mut self, event: &Event);

    /// All events with timestamp `time` have been delivered.
    fn on_step_end(&mut self, _time: u64) {}

    /// The run is over; flush buffers.
    fn on_run_end(&mut self, _final_time: u64) {}
}

/// Handler that drops everything.
pub struct NoopHandler;

impl EventHandler for NoopHandler {
    fn handle_event(&mut self, _event: &Event) {}
}

pub struct EventBus<'h> {
    handlers:  Vec<&'h mut dyn EventHandler>,
    last_time: Option<u64>,
    emitted:   u64,
}

impl<'h> EventBus<'h> {
    /// Bus delivering to `handlers` in the order given.
    pub fn new(handlers: Vec<&'h mut dyn EventHandler>) -> Self {
        Self { handlers, last_time: None, emitted: 0 }
    }

    /// Bus without subscribers; events are still ordered and counted.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn subscribe(&mut self, handler: &'h mut dyn EventHandler) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Total events delivered so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Timestamp of the most recent delivered event.
    pub fn last_time(&self) -> Option<u64> {
        self.last_time
    }

    /// Merge this step's batches by the `(time, agent, priority)` tie-break
    /// and deliver them, then signal `on_step_end(time)`.
    ///
    /// Fails with [`EventError::OutOfOrder`] (nothing delivered) if any event
    /// is older than one already delivered.
    pub fn finalize_step(&mut self, time: u64, batches: Vec<Vec<Event>>) -> EventResult<usize> {
        let events = merge_events(batches);
        if let (Some(last), Some(first)) = (self.last_time, events.first()) {
            if first.time < last {
                return Err(EventError::OutOfOrder { last, got: first.time });
            }
        }
        for event in &events {
            for handler in self.handlers.iter_mut() {
                handler.handle_event(event);
            }
        }
        for handler in self.handlers.iter_mut() {
            handler.on_step_end(time);
        }
        if let Some(last) = events.last() {
            self.last_time = Some(last.time);
        }
        self.emitted += events.len() as u64;
        tracing::trace!(time, events = events.len(), "step events delivered");
        Ok(events.len())
    }

    /// Signal the end of the run to every handler.
    pub fn finish(&mut self, final_time: u64) {
        for handler in self.handlers.iter_mut() {
            handler.on_run_end(final_time);
        }
    }
}
