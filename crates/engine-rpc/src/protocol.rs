use keeper_dcs::{Cluster, Member};
use keeper_engine::{Capabilities, Error, RoleType, UserInfo};
use serde::{Deserialize, Serialize};

/// One engine-manager call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum EngineRequest {
    /// Declared optional capabilities.
    Capabilities,
    /// Name of the member the engine runs next to.
    CurrentMemberName,
    /// Replication role of the local database.
    GetReplicaRole { cluster: Cluster },
    /// Whether the local database leads.
    IsLeader { cluster: Cluster },
    /// Whether `member` leads.
    IsLeaderMember { cluster: Cluster, member: Member },
    /// Leader liveness check.
    LeaderHealthyCheck { cluster: Cluster },
    /// Local member health check.
    CurrentMemberHealthyCheck { cluster: Cluster },
    /// Local member health.
    IsCurrentMemberHealthy { cluster: Cluster },
    /// Health of `member`.
    IsMemberHealthy { cluster: Cluster, member: Member },
    /// Healthy members besides `leader`.
    HasOtherHealthyMembers { cluster: Cluster, leader: String },
    /// Remove a member from the database cluster.
    LeaveMemberFromCluster { cluster: Cluster, member_name: String },
    /// Add the local member to the database cluster.
    JoinCurrentMemberToCluster { cluster: Cluster },
    /// Switch to read-only.
    Lock { reason: String },
    /// Switch back to read-write.
    Unlock,
    /// Promote `candidate`.
    Failover { cluster: Cluster, candidate: String },
    /// Post-provision hook.
    PostProvision { cluster: Cluster },
    /// Pre-terminate hook.
    PreTerminate,
    /// Create an account.
    CreateUser { user: UserInfo },
    /// Drop an account.
    DeleteUser { user_name: String },
    /// Describe an account.
    DescribeUser { user_name: String },
    /// List application accounts.
    ListUsers,
    /// List system accounts.
    ListSystemAccounts,
    /// Grant a role.
    GrantUserRole { user_name: String, role: RoleType },
    /// Revoke a role.
    RevokeUserRole { user_name: String, role: RoleType },
}

/// Result of one engine-manager call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum EngineResponse {
    /// Declared optional capabilities.
    Capabilities(Capabilities),
    /// A member name.
    MemberName(String),
    /// A replication role.
    Role(String),
    /// A yes/no answer.
    Bool(bool),
    /// A member list.
    Members(Vec<Member>),
    /// One account.
    User(UserInfo),
    /// Several accounts.
    Users(Vec<UserInfo>),
    /// The call succeeded with nothing to return.
    Done,
    /// The call failed.
    Error(Error),
}
