use crate::error::Error;
use crate::protocol::{EngineRequest, EngineResponse};

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use keeper_dcs::{Cluster, Member};
use keeper_engine::{Capabilities, EngineManager, Result, RoleType, UserInfo};
use keeper_rpc::RpcClient;
use tracing::{info, warn};

/// Engine manager living in another process, reached over the rpc side channel.
#[derive(Clone, Debug)]
pub struct RemoteEngineManager {
    client: RpcClient<EngineRequest, EngineResponse>,
    capabilities: Capabilities,
    member_name: String,
}

impl RemoteEngineManager {
    /// Connects to the engine server at `addr` and reads its capabilities and
    /// member name once.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or answers unexpectedly.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> std::result::Result<Self, Error> {
        let client = RpcClient::new(addr).with_timeout(timeout);

        let capabilities = match client.send(&EngineRequest::Capabilities).await? {
            EngineResponse::Capabilities(capabilities) => capabilities,
            EngineResponse::Error(e) => return Err(e.into()),
            _ => return Err(Error::UnexpectedResponse("capabilities")),
        };

        let member_name = match client.send(&EngineRequest::CurrentMemberName).await? {
            EngineResponse::MemberName(name) => name,
            EngineResponse::Error(e) => return Err(e.into()),
            _ => return Err(Error::UnexpectedResponse("current member name")),
        };

        info!(
            "connected to remote engine manager at {} for member {}",
            addr, member_name
        );

        Ok(Self {
            client,
            capabilities,
            member_name,
        })
    }

    async fn call(&self, request: EngineRequest) -> std::result::Result<EngineResponse, Error> {
        match self.client.send(&request).await? {
            EngineResponse::Error(e) => Err(e.into()),
            response => Ok(response),
        }
    }

    async fn call_done(&self, request: EngineRequest, what: &'static str) -> Result<()> {
        match self.call(request).await? {
            EngineResponse::Done => Ok(()),
            _ => Err(Error::UnexpectedResponse(what).into()),
        }
    }

    async fn call_bool(&self, request: EngineRequest, what: &'static str) -> Result<bool> {
        match self.call(request).await? {
            EngineResponse::Bool(value) => Ok(value),
            _ => Err(Error::UnexpectedResponse(what).into()),
        }
    }

    async fn call_users(&self, request: EngineRequest, what: &'static str) -> Result<Vec<UserInfo>> {
        match self.call(request).await? {
            EngineResponse::Users(users) => Ok(users),
            _ => Err(Error::UnexpectedResponse(what).into()),
        }
    }
}

#[async_trait]
impl EngineManager for RemoteEngineManager {
    fn capabilities(&self) -> Capabilities {
        // Pushed roles cannot cross a request/response channel.
        Capabilities {
            role_subscription: false,
            ..self.capabilities
        }
    }

    fn get_current_member_name(&self) -> String {
        self.member_name.clone()
    }

    async fn get_replica_role(&self, cluster: &Cluster) -> Result<String> {
        let request = EngineRequest::GetReplicaRole {
            cluster: cluster.clone(),
        };
        match self.call(request).await? {
            EngineResponse::Role(role) => Ok(role),
            _ => Err(Error::UnexpectedResponse("get replica role").into()),
        }
    }

    async fn is_leader(&self, cluster: &Cluster) -> Result<bool> {
        let request = EngineRequest::IsLeader {
            cluster: cluster.clone(),
        };
        self.call_bool(request, "is leader").await
    }

    async fn is_leader_member(&self, cluster: &Cluster, member: &Member) -> Result<bool> {
        let request = EngineRequest::IsLeaderMember {
            cluster: cluster.clone(),
            member: member.clone(),
        };
        self.call_bool(request, "is leader member").await
    }

    async fn leader_healthy_check(&self, cluster: &Cluster) -> Result<()> {
        let request = EngineRequest::LeaderHealthyCheck {
            cluster: cluster.clone(),
        };
        self.call_done(request, "leader healthy check").await
    }

    async fn current_member_healthy_check(&self, cluster: &Cluster) -> Result<()> {
        let request = EngineRequest::CurrentMemberHealthyCheck {
            cluster: cluster.clone(),
        };
        self.call_done(request, "current member healthy check").await
    }

    async fn is_current_member_healthy(&self, cluster: &Cluster) -> bool {
        let request = EngineRequest::IsCurrentMemberHealthy {
            cluster: cluster.clone(),
        };
        self.call_bool(request, "is current member healthy")
            .await
            .unwrap_or_else(|e| {
                warn!("remote health check failed: {}", e);
                false
            })
    }

    async fn is_member_healthy(&self, cluster: &Cluster, member: &Member) -> bool {
        let request = EngineRequest::IsMemberHealthy {
            cluster: cluster.clone(),
            member: member.clone(),
        };
        self.call_bool(request, "is member healthy")
            .await
            .unwrap_or_else(|e| {
                warn!("remote health check of {} failed: {}", member.name, e);
                false
            })
    }

    async fn has_other_healthy_members(&self, cluster: &Cluster, leader: &str) -> Vec<Member> {
        let request = EngineRequest::HasOtherHealthyMembers {
            cluster: cluster.clone(),
            leader: leader.to_string(),
        };
        match self.call(request).await {
            Ok(EngineResponse::Members(members)) => members,
            Ok(_) => {
                warn!("unexpected response to has other healthy members");
                Vec::new()
            }
            Err(e) => {
                warn!("remote healthy members lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn leave_member_from_cluster(&self, cluster: &Cluster, member_name: &str) -> Result<()> {
        let request = EngineRequest::LeaveMemberFromCluster {
            cluster: cluster.clone(),
            member_name: member_name.to_string(),
        };
        self.call_done(request, "leave member from cluster").await
    }

    async fn join_current_member_to_cluster(&self, cluster: &Cluster) -> Result<()> {
        let request = EngineRequest::JoinCurrentMemberToCluster {
            cluster: cluster.clone(),
        };
        self.call_done(request, "join current member to cluster").await
    }

    async fn lock(&self, reason: &str) -> Result<()> {
        let request = EngineRequest::Lock {
            reason: reason.to_string(),
        };
        self.call_done(request, "lock").await
    }

    async fn unlock(&self) -> Result<()> {
        self.call_done(EngineRequest::Unlock, "unlock").await
    }

    async fn failover(&self, cluster: &Cluster, candidate: &str) -> Result<()> {
        let request = EngineRequest::Failover {
            cluster: cluster.clone(),
            candidate: candidate.to_string(),
        };
        self.call_done(request, "failover").await
    }

    async fn post_provision(&self, cluster: &Cluster) -> Result<()> {
        let request = EngineRequest::PostProvision {
            cluster: cluster.clone(),
        };
        self.call_done(request, "post provision").await
    }

    async fn pre_terminate(&self) -> Result<()> {
        self.call_done(EngineRequest::PreTerminate, "pre terminate").await
    }

    async fn create_user(&self, user: &UserInfo) -> Result<()> {
        let request = EngineRequest::CreateUser { user: user.clone() };
        self.call_done(request, "create user").await
    }

    async fn delete_user(&self, user_name: &str) -> Result<()> {
        let request = EngineRequest::DeleteUser {
            user_name: user_name.to_string(),
        };
        self.call_done(request, "delete user").await
    }

    async fn describe_user(&self, user_name: &str) -> Result<UserInfo> {
        let request = EngineRequest::DescribeUser {
            user_name: user_name.to_string(),
        };
        match self.call(request).await? {
            EngineResponse::User(user) => Ok(user),
            _ => Err(Error::UnexpectedResponse("describe user").into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>> {
        self.call_users(EngineRequest::ListUsers, "list users").await
    }

    async fn list_system_accounts(&self) -> Result<Vec<UserInfo>> {
        self.call_users(EngineRequest::ListSystemAccounts, "list system accounts")
            .await
    }

    async fn grant_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        let request = EngineRequest::GrantUserRole {
            user_name: user_name.to_string(),
            role,
        };
        self.call_done(request, "grant user role").await
    }

    async fn revoke_user_role(&self, user_name: &str, role: RoleType) -> Result<()> {
        let request = EngineRequest::RevokeUserRole {
            user_name: user_name.to_string(),
            role,
        };
        self.call_done(request, "revoke user role").await
    }
}
