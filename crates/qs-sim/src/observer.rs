//! Simulation observer trait for progress reporting and data collection.

use qs_core::SimClock;

use crate::SimReport;

/// Per-step counters passed to [`SimObserver::on_step_end`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    pub tick:               u64,
    pub time:               u64,
    pub events:             usize,
    pub departures:         usize,
    pub link_moves:         usize,
    pub arrivals:           usize,
    /// Links whose head could not move on for lack of downstream storage.
    pub blocked_links:      usize,
    pub blocked_departures: usize,
    /// Entities in link queues after the step.
    pub en_route:           usize,
    pub departing:          usize,
    pub finished_total:     usize,
    pub boundary_transfers: usize,
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// step loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_step_end(&mut self, stats: &StepStats) {
///         if stats.tick % self.interval == 0 {
///             println!("t={}: {} en route", stats.time, stats.en_route);
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each step, before any processing.
    fn on_step_start(&mut self, _clock: &SimClock) {}

    /// Called after the step's events have been delivered.
    fn on_step_end(&mut self, _stats: &StepStats) {}

    /// Called once after the run stops.
    fn on_sim_end(&mut self, _report: &SimReport) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
