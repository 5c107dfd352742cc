use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The server has already been started.
    #[error("the server has already been started")]
    AlreadyStarted,

    /// Failed to bind to address.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),
}
