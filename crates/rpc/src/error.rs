use std::time::Duration;

use thiserror::Error;

/// Result type alias for rpc calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The server has already been started.
    #[error("the server has already been started")]
    AlreadyStarted,

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(String),

    /// A frame could not be decoded.
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// A frame exceeds the size limit.
    #[error("frame size {0} exceeds maximum {1}")]
    FrameTooLarge(usize, usize),

    /// No response within the deadline.
    #[error("rpc timed out after {0:?}")]
    Timeout(Duration),
}
