use serde::{Deserialize, Serialize};

/// Optional capabilities an engine manager declares when it is constructed.
///
/// The core set (role, health, membership, lock) is always required. Anything
/// here defaults to absent.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Capabilities {
    /// Can promote a candidate after the leader is lost.
    pub failover: bool,

    /// Has a hook to run once the cluster is provisioned.
    pub post_provision: bool,

    /// Has a hook to run before the instance terminates.
    pub pre_terminate: bool,

    /// Manages database accounts.
    pub accounts: bool,

    /// Pushes role changes instead of waiting to be polled.
    pub role_subscription: bool,
}

impl Capabilities {
    /// Every optional capability present.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            failover: true,
            post_provision: true,
            pre_terminate: true,
            accounts: true,
            role_subscription: true,
        }
    }
}
