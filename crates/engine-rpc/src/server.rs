use crate::protocol::{EngineRequest, EngineResponse};

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use keeper_engine::EngineManager;
use keeper_rpc::{RpcHandler, RpcServer};

/// Server exposing an engine manager over the rpc side channel.
pub type EngineRpcServer = RpcServer<EngineHandler>;

/// Creates a server exposing `engine` on `listen_addr`.
pub fn engine_rpc_server(listen_addr: SocketAddr, engine: Arc<dyn EngineManager>) -> EngineRpcServer {
    RpcServer::new("engine rpc server", listen_addr, EngineHandler { engine })
}

/// Forwards decoded requests to an engine manager.
pub struct EngineHandler {
    engine: Arc<dyn EngineManager>,
}

fn done(result: keeper_engine::Result<()>) -> EngineResponse {
    result.map_or_else(EngineResponse::Error, |()| EngineResponse::Done)
}

#[async_trait]
impl RpcHandler for EngineHandler {
    type Request = EngineRequest;
    type Response = EngineResponse;

    async fn handle(&self, request: EngineRequest) -> EngineResponse {
        let engine = &self.engine;

        match request {
            EngineRequest::Capabilities => EngineResponse::Capabilities(engine.capabilities()),
            EngineRequest::CurrentMemberName => {
                EngineResponse::MemberName(engine.get_current_member_name())
            }
            EngineRequest::GetReplicaRole { cluster } => engine
                .get_replica_role(&cluster)
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::Role),
            EngineRequest::IsLeader { cluster } => engine
                .is_leader(&cluster)
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::Bool),
            EngineRequest::IsLeaderMember { cluster, member } => engine
                .is_leader_member(&cluster, &member)
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::Bool),
            EngineRequest::LeaderHealthyCheck { cluster } => {
                done(engine.leader_healthy_check(&cluster).await)
            }
            EngineRequest::CurrentMemberHealthyCheck { cluster } => {
                done(engine.current_member_healthy_check(&cluster).await)
            }
            EngineRequest::IsCurrentMemberHealthy { cluster } => {
                EngineResponse::Bool(engine.is_current_member_healthy(&cluster).await)
            }
            EngineRequest::IsMemberHealthy { cluster, member } => {
                EngineResponse::Bool(engine.is_member_healthy(&cluster, &member).await)
            }
            EngineRequest::HasOtherHealthyMembers { cluster, leader } => EngineResponse::Members(
                engine.has_other_healthy_members(&cluster, &leader).await,
            ),
            EngineRequest::LeaveMemberFromCluster {
                cluster,
                member_name,
            } => done(engine.leave_member_from_cluster(&cluster, &member_name).await),
            EngineRequest::JoinCurrentMemberToCluster { cluster } => {
                done(engine.join_current_member_to_cluster(&cluster).await)
            }
            EngineRequest::Lock { reason } => done(engine.lock(&reason).await),
            EngineRequest::Unlock => done(engine.unlock().await),
            EngineRequest::Failover { cluster, candidate } => {
                done(engine.failover(&cluster, &candidate).await)
            }
            EngineRequest::PostProvision { cluster } => done(engine.post_provision(&cluster).await),
            EngineRequest::PreTerminate => done(engine.pre_terminate().await),
            EngineRequest::CreateUser { user } => done(engine.create_user(&user).await),
            EngineRequest::DeleteUser { user_name } => done(engine.delete_user(&user_name).await),
            EngineRequest::DescribeUser { user_name } => engine
                .describe_user(&user_name)
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::User),
            EngineRequest::ListUsers => engine
                .list_users()
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::Users),
            EngineRequest::ListSystemAccounts => engine
                .list_system_accounts()
                .await
                .map_or_else(EngineResponse::Error, EngineResponse::Users),
            EngineRequest::GrantUserRole { user_name, role } => {
                done(engine.grant_user_role(&user_name, role).await)
            }
            EngineRequest::RevokeUserRole { user_name, role } => {
                done(engine.revoke_user_role(&user_name, role).await)
            }
        }
    }
}
