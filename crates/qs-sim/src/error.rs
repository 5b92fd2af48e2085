use qs_agent::AgentError;
use qs_core::CoreError;
use qs_events::EventError;
use qs_mobility::MobilityError;
use qs_network::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// A contract between components was broken mid-run.  The run is aborted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("link queue error: {0}")]
    Mobility(#[from] MobilityError),

    #[error("event error: {0}")]
    Event(#[from] EventError),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl SimError {
    /// `true` for errors raised by a broken runtime contract, whichever
    /// component detected it.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SimError::InvariantViolation(_)
                | SimError::Agent(AgentError::IllegalTransition { .. })
                | SimError::Mobility(MobilityError::InvariantViolation { .. })
                | SimError::Event(EventError::OutOfOrder { .. })
        )
    }
}

pub type SimResult<T> = Result<T, SimError>;
