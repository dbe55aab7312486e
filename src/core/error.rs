use thiserror::Error;

/// Reasons a tick is refused before it reaches the voter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("empty reading vector")]
    Empty,

    #[error("reading vector has {actual} slots, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("register source is not connected")]
    NotConnected,

    #[error("no response from device: {0}")]
    NoResponse(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("register source exhausted")]
    Exhausted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing recorded yet")]
    NoData,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown voting strategy: {0}")]
pub struct ParseStrategyError(pub String);
