use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while registering or running operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The bound engine manager does not provide the capability.
    #[error("{0} is not implemented")]
    NotImplemented(String),

    /// The check ran and detected an unhealthy or changed condition.
    #[error("{0}")]
    Probe(String),

    /// A precondition of the request does not hold.
    #[error("{0}")]
    PreCheck(String),

    /// The local member is missing from the cluster view.
    #[error("member {0} not found in cluster")]
    MemberNotFound(String),

    /// The engine manager call failed.
    #[error(transparent)]
    Engine(keeper_engine::Error),

    /// The cluster-state store call failed.
    #[error(transparent)]
    Dcs(#[from] keeper_dcs::Error),

    /// An event could not be emitted.
    #[error(transparent)]
    Events(#[from] keeper_events::Error),

    /// Volume stats could not be fetched or parsed.
    #[error("volume stats: {0}")]
    VolumeStats(String),

    /// The operation did not finish within its timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// An operation was used before `init`.
    #[error("operation {0} is not initialized")]
    NotInitialized(&'static str),

    /// Two operations were registered under the same action.
    #[error("operation {0} is already registered")]
    DuplicateOperation(&'static str),

    /// No engine manager could be bound for the action.
    #[error("no engine manager available for {0}")]
    NoEngineManager(&'static str),

    /// A job or request names an action nobody registered.
    #[error("unknown operation {0}")]
    UnknownOperation(String),

    /// A static setting is invalid.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl From<keeper_engine::Error> for Error {
    fn from(error: keeper_engine::Error) -> Self {
        match error {
            keeper_engine::Error::NotImplemented(what) => Self::NotImplemented(what),
            other => Self::Engine(other),
        }
    }
}

/// Result type for operations.
pub type Result<T> = std::result::Result<T, Error>;
