use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The rpc exchange failed.
    #[error(transparent)]
    Rpc(#[from] keeper_rpc::Error),

    /// The server answered with a response that does not fit the request.
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    /// The remote engine manager returned an error.
    #[error(transparent)]
    Engine(#[from] keeper_engine::Error),
}

impl From<Error> for keeper_engine::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Engine(e) => e,
            other => Self::Failed(other.to_string()),
        }
    }
}
