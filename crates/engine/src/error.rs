use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by an engine manager.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum Error {
    /// The engine manager does not provide the capability.
    #[error("{0} is not implemented")]
    NotImplemented(String),

    /// The check ran and found the target unhealthy.
    #[error("unhealthy: {0}")]
    Unhealthy(String),

    /// The request was rejected before reaching the database.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine call itself failed.
    #[error("engine error: {0}")]
    Failed(String),
}
