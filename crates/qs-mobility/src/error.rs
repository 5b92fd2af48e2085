use qs_core::LinkId;
use qs_network::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobilityError {
    /// A caller broke a queue contract (non-adjacent entry, committing more
    /// departures than were offered).
    #[error("link queue invariant violated on {link}: {reason}")]
    InvariantViolation { link: LinkId, reason: String },

    #[error("network error: {0}")]
    Network(#[from] NetworkError),
}

pub type MobilityResult<T> = Result<T, MobilityError>;
