//! `qs-mobility`: link queues with storage and flow capacity.
//!
//! # Crate layout
//!
//! | Module         | Contents                                            |
//! |----------------|-----------------------------------------------------|
//! | [`flow`]       | `FlowBucket`: leaky-bucket flow credits             |
//! | [`link_queue`] | `LinkQueue`, `QueuedAgent`, `Admission`             |
//! | [`error`]      | `MobilityError`, `MobilityResult<T>`                |
//!
//! Queues hold agent ids only; the agents themselves live with whichever
//! partition owns the link they are on.

pub mod error;
pub mod flow;
pub mod link_queue;

#[cfg(test)]
mod tests;

pub use error::{MobilityError, MobilityResult};
pub use flow::FlowBucket;
pub use link_queue::{Admission, LinkQueue, QueuedAgent};
