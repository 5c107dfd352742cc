//! Engine-manager interface: the per-database driver the agent drives through
//! role, health, membership and lock primitives.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod account;
mod capabilities;
mod error;
mod resolver;

pub use account::{RoleType, UserInfo};
pub use capabilities::Capabilities;
pub use error::Error;
pub use resolver::{BoundEngine, EngineResolver, Strategy};

use async_trait::async_trait;
use keeper_dcs::{Cluster, Member};
use tokio::sync::mpsc;

/// Result type for engine calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-database driver.
///
/// The required methods make up the core capability set. The provided
/// methods are optional capabilities; an implementation that supports one
/// overrides the method and declares it in [`EngineManager::capabilities`].
#[async_trait]
pub trait EngineManager
where
    Self: Send + Sync + 'static,
{
    /// Optional capabilities, fixed for the lifetime of the manager.
    fn capabilities(&self) -> Capabilities;

    /// Name of the member this manager runs next to.
    fn get_current_member_name(&self) -> String;

    /// Reads the replication role of the local database.
    async fn get_replica_role(&self, cluster: &Cluster) -> Result<String>;

    /// Whether the local database is the leader.
    async fn is_leader(&self, cluster: &Cluster) -> Result<bool>;

    /// Whether `member` is the leader.
    async fn is_leader_member(&self, cluster: &Cluster, member: &Member) -> Result<bool>;

    /// Checks that the cluster leader is alive.
    async fn leader_healthy_check(&self, cluster: &Cluster) -> Result<()>;

    /// Checks that the local member is healthy.
    async fn current_member_healthy_check(&self, cluster: &Cluster) -> Result<()>;

    /// Whether the local member is healthy.
    async fn is_current_member_healthy(&self, cluster: &Cluster) -> bool;

    /// Whether `member` is healthy.
    async fn is_member_healthy(&self, cluster: &Cluster, member: &Member) -> bool;

    /// Healthy members other than `leader`.
    async fn has_other_healthy_members(&self, cluster: &Cluster, leader: &str) -> Vec<Member>;

    /// Removes `member_name` from the database cluster.
    async fn leave_member_from_cluster(&self, cluster: &Cluster, member_name: &str) -> Result<()>;

    /// Adds the local member to the database cluster.
    async fn join_current_member_to_cluster(&self, cluster: &Cluster) -> Result<()>;

    /// Puts the instance in read-only mode.
    async fn lock(&self, reason: &str) -> Result<()>;

    /// Returns the instance to read-write mode.
    async fn unlock(&self) -> Result<()>;

    /// Promotes `candidate` after the leader is lost.
    async fn failover(&self, _cluster: &Cluster, _candidate: &str) -> Result<()> {
        Err(Error::NotImplemented("failover".to_string()))
    }

    /// Runs once the cluster has been provisioned.
    async fn post_provision(&self, _cluster: &Cluster) -> Result<()> {
        Err(Error::NotImplemented("post provision".to_string()))
    }

    /// Runs before the instance terminates.
    async fn pre_terminate(&self) -> Result<()> {
        Err(Error::NotImplemented("pre terminate".to_string()))
    }

    /// Creates an account.
    async fn create_user(&self, _user: &UserInfo) -> Result<()> {
        Err(Error::NotImplemented("create user".to_string()))
    }

    /// Drops an account.
    async fn delete_user(&self, _user_name: &str) -> Result<()> {
        Err(Error::NotImplemented("delete user".to_string()))
    }

    /// Describes an account.
    async fn describe_user(&self, _user_name: &str) -> Result<UserInfo> {
        Err(Error::NotImplemented("describe user".to_string()))
    }

    /// Lists application accounts.
    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        Err(Error::NotImplemented("list users".to_string()))
    }

    /// Lists system accounts.
    async fn list_system_accounts(&self) -> Result<Vec<UserInfo>> {
        Err(Error::NotImplemented("list system accounts".to_string()))
    }

    /// Grants `role` to an account.
    async fn grant_user_role(&self, _user_name: &str, _role: RoleType) -> Result<()> {
        Err(Error::NotImplemented("grant user role".to_string()))
    }

    /// Revokes `role` from an account.
    async fn revoke_user_role(&self, _user_name: &str, _role: RoleType) -> Result<()> {
        Err(Error::NotImplemented("revoke user role".to_string()))
    }

    /// Stream of roles pushed by the database.
    async fn subscribe_roles(&self) -> Result<mpsc::Receiver<String>> {
        Err(Error::NotImplemented("role subscription".to_string()))
    }
}
