use thiserror::Error;

/// Errors that can occur while building the scheduler.
#[derive(Debug, Error)]
pub enum Error {
    /// A job names an operation that is not registered.
    #[error("job {0} names an unknown operation")]
    UnknownOperation(String),

    /// A job period or timeout is zero.
    #[error("job {0} needs a non-zero period and timeout")]
    ZeroInterval(String),
}
