//! Output errors.

use thiserror::Error;

/// Failure writing an output file.  Event handlers and observers cannot
/// return errors, so writers hold the first one until `finish`.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV row: {0}")]
    Csv(#[from] csv::Error),
}

pub type OutputResult<T> = Result<T, OutputError>;
