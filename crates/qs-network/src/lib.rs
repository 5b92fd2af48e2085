//! `qs-network`: immutable network graph, loading, and partitioning.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`graph`]     | `NetworkGraph` (CSR both directions), `NetworkBuilder`     |
//! | [`loader`]    | `load_network_csv`, `load_network_readers`, `NetworkIndex` |
//! | [`partition`] | `NetworkPartitioner`, `Partitioning`                       |
//! | [`error`]     | `NetworkError`, `NetworkResult<T>`                         |

pub mod error;
pub mod graph;
pub mod loader;
pub mod partition;


pub use error::{NetworkError, NetworkResult};
pub use graph::{Link, LinkSpec, NetworkBuilder, NetworkGraph, Node};
pub use loader::{NetworkIndex, load_network_csv, load_network_readers};
pub use partition::{NetworkPartitioner, Partitioning};
