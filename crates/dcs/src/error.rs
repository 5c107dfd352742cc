use thiserror::Error;

/// Errors surfaced by a cluster-state store.
#[derive(Debug, Error)]
pub enum Error {
    /// The HA configuration has not been created yet.
    #[error("no HA configuration")]
    NoHaConfig,

    /// A switchover request is already pending.
    #[error("there is another switchover {0} unfinished")]
    SwitchoverPending(String),

    /// The store could not be reached or rejected the call.
    #[error("dcs backend error: {0}")]
    Backend(String),
}
