use thiserror::Error;

/// Errors produced by the search core.
///
/// `Interrupted` and `Timeout` are not fatal to the caller: the engine still
/// releases its heaps and map before surfacing them through `Finished(false)`.
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("endpoint ({x}, {y}, {z}) is invalid: {reason}")]
    InvalidEndpoint { x: i32, y: i32, z: i32, reason: &'static str },

    #[error("search interrupted by cancellation token")]
    Interrupted,

    #[error("search exceeded timeout of {0:?}")]
    Timeout(std::time::Duration),

    #[error("fill record is corrupt: {0}")]
    CorruptFill(&'static str),

    #[error("fill record uses unknown cost metric {0:?}")]
    UnknownMetric(String),

    #[error("cost/heuristic oracle failed at ({x}, {y}, {z})")]
    OracleFailure { x: i32, y: i32, z: i32, #[source] source: Box<dyn std::error::Error + Send + Sync> },

    #[error("i/o error while reading or writing a fill record")]
    Io(#[from] std::io::Error),
}

pub type TracerResult<T> = Result<T, TracerError>;
