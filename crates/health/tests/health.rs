use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use keeper_bootable::Bootable;
use keeper_dcs::{Cluster, Leader, Member};
use keeper_dcs_memory::MemoryDcs;
use keeper_engine::{EngineResolver, Error as EngineError};
use keeper_engine_mock::MockEngineManager;
use keeper_events::MemoryEventSink;
use keeper_health::{HealthClient, HealthRequest, HealthResponse, HealthServer, health_server};
use keeper_operations::ops::CHECK_ROLE;
use keeper_operations::{
    InitContext, Operation, OperationBase, OpsRequest, OpsResponse, RegistryBuilder, Result,
    Settings,
};

fn check() -> HealthRequest {
    HealthRequest::Check {
        service: String::new(),
    }
}

async fn serve(check_role: Arc<dyn Operation>) -> (HealthServer, HealthClient) {
    let server = health_server("127.0.0.1:0".parse().unwrap(), check_role);
    server.start().await.unwrap();
    let client = HealthClient::new(server.local_addr().unwrap());
    (server, client)
}

async fn role_check(engine: &MockEngineManager) -> Arc<dyn Operation> {
    let cluster = Cluster {
        name: "mongo".to_string(),
        members: vec![Member {
            name: "mongo-0".to_string(),
            ..Member::default()
        }],
        leader: Some(Leader {
            name: "mongo-0".to_string(),
            ..Leader::default()
        }),
        ..Cluster::default()
    };
    let ctx = InitContext {
        dcs: Arc::new(MemoryDcs::new(cluster)),
        events: Arc::new(MemoryEventSink::new()),
        engines: EngineResolver::new().with_builtin(Arc::new(engine.clone())),
        settings: Settings {
            pod_name: "mongo-0".to_string(),
            ..Settings::default()
        },
        volume_stats: None,
    };
    let registry = RegistryBuilder::with_builtin_operations()
        .unwrap()
        .build(&ctx)
        .await
        .unwrap();

    registry.require(CHECK_ROLE).unwrap()
}

/// Role check that never answers.
struct Stuck {
    base: OperationBase,
}

#[async_trait]
impl Operation for Stuck {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, _ctx: &InitContext) -> Result<()> {
        Ok(())
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_check_follows_role_changes() {
    let engine = MockEngineManager::new("mongo-0");
    let (server, client) = serve(role_check(&engine).await).await;

    // First observation is a change.
    assert_matches!(
        client.send(&check()).await.unwrap(),
        HealthResponse::NotServing { error: Some(detail) } if detail.contains("primary")
    );
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);

    engine.set_role("secondary");
    assert_matches!(client.send(&check()).await.unwrap(), HealthResponse::NotServing { .. });
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);

    assert_eq!(
        client
            .send(&HealthRequest::Watch {
                service: String::new()
            })
            .await
            .unwrap(),
        HealthResponse::Unimplemented
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_role_read_keeps_serving() {
    let engine = MockEngineManager::new("mongo-0");
    let (server, client) = serve(role_check(&engine).await).await;

    let _ = client.send(&check()).await.unwrap();
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);

    engine.fail(
        "get_replica_role",
        EngineError::Failed("connection refused".to_string()),
    );
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);

    engine.clear_failure("get_replica_role");
    assert_eq!(client.send(&check()).await.unwrap(), HealthResponse::Serving);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stuck_check_times_out() {
    let stuck = Stuck {
        base: OperationBase::new(CHECK_ROLE),
    };
    stuck.set_timeout(Duration::from_millis(100));
    let (server, client) = serve(Arc::new(stuck)).await;

    assert_matches!(
        client.send(&check()).await.unwrap(),
        HealthResponse::NotServing { error: Some(detail) } if detail.contains("timed out")
    );

    server.shutdown().await.unwrap();
}
