use qs_core::AgentId;
use thiserror::Error;

use crate::AgentState;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent}: illegal transition {action} from {from:?}")]
    IllegalTransition {
        agent:  AgentId,
        from:   AgentState,
        action: &'static str,
    },

    #[error("invalid itinerary: {0}")]
    InvalidItinerary(String),

    #[error("plans parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
