//! `qs-sim`: partitioned step scheduler for the queue-based network
//! simulation.
//!
//! # Step loop
//!
//! ```text
//! while agents remain and now <= max_sim_time_secs and not cancelled:
//!   ① Local     : per partition, accrue flow, wake due activity ends,
//!                 offer departures and ready link heads.
//!   ② Resolve   : one global pass, link offers by link id and queue
//!                 position, then departures by agent id; each accepted
//!                 entry reserves a storage slot on its target.
//!   ③ Apply     : per partition, pop accepted heads, run transitions,
//!                 emit events, package link entries as transfers.
//!   ④ Handoff   : per partition, insert incoming transfers in resolution
//!                 order.
//!   ⑤ Finalize  : merge events into the EventBus, report StepStats.
//! ```
//!
//! Phases ①, ③ and ④ touch only partition-owned state and run in parallel
//! with the `parallel` feature.  Phase ② sees every offer in a fixed order,
//! so the event stream is identical for any partition count.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs phases ①, ③, ④ on Rayon's thread pool (default).  |
//! | `fx-hash`  | FxHash for the per-step storage reservation map.       |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use qs_events::{EventBus, EventLog};
//! use qs_sim::{NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(config, graph).agents(agents).build()?;
//! let mut log = EventLog::new();
//! let mut bus = EventBus::new(vec![&mut log]);
//! let report = sim.run(&mut bus, &mut NoopObserver)?;
//! ```

pub mod builder;
pub mod cancel;
pub mod error;
pub mod observer;
pub mod report;
pub mod sim;

mod exchange;
mod partition;
mod workers;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use cancel::CancelToken;
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver, StepStats};
pub use report::{CapacityWarning, EndReason, SimReport};
pub use sim::Sim;
