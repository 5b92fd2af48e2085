use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    /// A step tried to publish events older than ones already delivered.
    #[error("event at t={got} published after t={last}")]
    OutOfOrder { last: u64, got: u64 },
}

pub type EventResult<T> = Result<T, EventError>;
