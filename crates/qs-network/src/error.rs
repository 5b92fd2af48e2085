//! Network-subsystem error type.

use thiserror::Error;

use qs_core::{LinkId, NodeId};

/// Errors produced by `qs-network`.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("link {0} not found in network")]
    LinkNotFound(LinkId),

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    /// Malformed network; fatal at construction.
    #[error("invalid network topology: {0}")]
    InvalidTopology(String),

    #[error("partitioning error: {0}")]
    Partition(String),

    #[error("network parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
