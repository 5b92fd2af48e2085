//! `qs-core`: foundational types for the queue-based network simulation.
//!
//! This crate is a dependency of every other `qs-*` crate.  It has no `qs-*`
//! dependencies and few external ones (`serde`, `toml`, `thiserror`).
//!
//! # What lives here
//!
//! | Module     | Contents                                         |
//! |------------|--------------------------------------------------|
//! | [`ids`]    | `AgentId`, `NodeId`, `LinkId`, `PartitionId`     |
//! | [`geo`]    | `Coord`, Euclidean distance                      |
//! | [`time`]   | `Tick`, `SimClock`                               |
//! | [`config`] | `SimConfig` (TOML-loadable run configuration)    |
//! | [`error`]  | `CoreError`, `CoreResult`                        |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::SimConfig;
pub use error::{CoreError, CoreResult};
pub use geo::Coord;
pub use ids::{AgentId, LinkId, NodeId, PartitionId};
pub use time::{SimClock, Tick};
