//! Built-in operations.

mod accounts;
mod check_role;
mod check_running;
mod get_role;
mod health_check;
mod join_member;
mod leave_member;
mod lifecycle;
mod lock;
mod switchover;

pub use accounts::{AccountAction, AccountOperation};
pub use check_role::CheckRole;
pub use check_running::CheckRunning;
pub use get_role::GetRole;
pub use health_check::{HealthCheck, LEADER_FAILURE_THRESHOLD};
pub use join_member::JoinMember;
pub use leave_member::LeaveMember;
pub use lifecycle::{Lifecycle, LifecycleHook};
pub use lock::{LockInstance, UnlockInstance};
pub use switchover::Switchover;

use crate::operation::Operation;
use crate::volume::VolumeProtection;

/// Action of the role check.
pub const CHECK_ROLE: &str = "checkrole";
/// Action of the role read.
pub const GET_ROLE: &str = "getrole";
/// Action of the member/leader health check.
pub const HEALTHY_CHECK: &str = "healthycheck";
/// Action of the database reachability check.
pub const CHECK_RUNNING: &str = "checkrunning";
/// Action of the switchover trigger.
pub const SWITCHOVER: &str = "switchover";
/// Action of the member-leave protocol.
pub const LEAVE_MEMBER: &str = "leavemember";
/// Action joining the local member.
pub const JOIN_MEMBER: &str = "joinmember";
/// Action switching the instance to read-only.
pub const LOCK_INSTANCE: &str = "lockinstance";
/// Action switching the instance back to read-write.
pub const UNLOCK_INSTANCE: &str = "unlockinstance";
/// Action of the volume watermark protection.
pub const VOLUME_PROTECTION: &str = "volumeprotection";
/// Action of the post-provision hook.
pub const POST_PROVISION: &str = "postprovision";
/// Action of the pre-terminate hook.
pub const PRE_TERMINATE: &str = "preterminate";

/// Every built-in operation, uninitialized.
pub(crate) fn builtin() -> Vec<Box<dyn Operation>> {
    let mut operations: Vec<Box<dyn Operation>> = vec![
        Box::new(CheckRole::new()),
        Box::new(GetRole::new()),
        Box::new(HealthCheck::new()),
        Box::new(CheckRunning::new()),
        Box::new(Switchover::new()),
        Box::new(LeaveMember::new()),
        Box::new(JoinMember::new()),
        Box::new(LockInstance::new()),
        Box::new(UnlockInstance::new()),
        Box::new(VolumeProtection::new()),
        Box::new(Lifecycle::new(LifecycleHook::PostProvision)),
        Box::new(Lifecycle::new(LifecycleHook::PreTerminate)),
    ];

    operations.extend(
        AccountAction::ALL
            .into_iter()
            .map(|action| Box::new(AccountOperation::new(action)) as Box<dyn Operation>),
    );

    operations
}
