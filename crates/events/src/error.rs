use thiserror::Error;

/// Errors that can occur while emitting events.
#[derive(Debug, Error)]
pub enum Error {
    /// The event message could not be encoded.
    #[error("failed to encode event message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The event endpoint could not be reached.
    #[error("failed to post event: {0}")]
    Request(#[from] reqwest::Error),

    /// The event endpoint rejected the event.
    #[error("event endpoint returned {0}")]
    Rejected(u16),
}
