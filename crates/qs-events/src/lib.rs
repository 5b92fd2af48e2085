//! `qs-events`: what happened, in a reproducible order.
//!
//! # Crate layout
//!
//! | Module    | Contents                                                   |
//! |-----------|------------------------------------------------------------|
//! | [`event`] | `Event`, `EventKind`, `merge_events`                       |
//! | [`bus`]   | `EventHandler` trait, `EventBus`, `NoopHandler`            |
//! | [`log`]   | `EventLog` recorder with query and replay helpers          |
//! | [`error`] | `EventError`, `EventResult<T>`                             |

pub mod bus;
pub mod error;
pub mod event;
pub mod log;

#[cfg(test)]
mod tests;

pub use bus::{EventBus, EventHandler, NoopHandler};
pub use error::{EventError, EventResult};
pub use event::{Event, EventKind, merge_events};
pub use log::EventLog;
