//! `qs-output`: writers and analyzers fed by a simulation run.
//!
//! | Type                  | Hooks into        | Produces                 |
//! |-----------------------|-------------------|--------------------------|
//! | [`CsvEventWriter`]    | `EventHandler`    | `events.csv`             |
//! | [`StepSummaryWriter`] | `SimObserver`     | `step_summaries.csv`     |
//! | [`DelayAnalyzer`]     | `EventHandler`    | link/agent delay totals, `link_delays.csv` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use qs_output::{CsvEventWriter, DelayAnalyzer, StepSummaryWriter};
//!
//! let mut events = CsvEventWriter::create(dir)?;
//! let mut delays = DelayAnalyzer::new(sim.graph(), 900);
//! let mut steps = StepSummaryWriter::create(dir)?;
//! let report = {
//!     let mut bus = EventBus::new(vec![&mut events, &mut delays]);
//!     sim.run(&mut bus, &mut steps)?
//! };
//! events.finish()?;
//! steps.finish()?;
//! ```

pub mod csv;
pub mod delay;
pub mod error;
pub mod row;


pub use crate::csv::{CsvEventWriter, StepSummaryWriter, EVENTS_FILE, STEP_SUMMARIES_FILE};
pub use delay::{AgentDelay, DelayAnalyzer, DelayBin, DelaySummary, LINK_DELAYS_FILE};
pub use error::{OutputError, OutputResult};
pub use row::{EventRow, StepSummaryRow};
