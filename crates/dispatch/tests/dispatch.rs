use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use keeper_bootable::Bootable;
use keeper_dcs::{Cluster, Dcs, HaConfig, Leader, Member, Switchover};
use keeper_dcs_memory::MemoryDcs;
use keeper_dispatch::{DispatchServer, router};
use keeper_engine::EngineResolver;
use keeper_engine_mock::MockEngineManager;
use keeper_events::MemoryEventSink;
use keeper_operations::{
    InitContext, Operation, OperationBase, OpsRequest, OpsResponse, Registry, RegistryBuilder,
    Result, Settings,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Sleepy {
    base: OperationBase,
}

#[async_trait]
impl Operation for Sleepy {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, _ctx: &InitContext) -> Result<()> {
        self.base.set_timeout(Duration::from_millis(50));
        Ok(())
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }
}

/// Store whose every call never completes.
struct StalledDcs;

#[async_trait]
impl Dcs for StalledDcs {
    async fn get_cluster(&self) -> keeper_dcs::Result<Cluster> {
        std::future::pending().await
    }

    async fn get_cluster_from_cache(&self) -> keeper_dcs::Result<Cluster> {
        std::future::pending().await
    }

    async fn update_ha_config(&self, _ha_config: &HaConfig) -> keeper_dcs::Result<()> {
        std::future::pending().await
    }

    async fn create_switchover(&self, _leader: &str, _candidate: &str) -> keeper_dcs::Result<()> {
        std::future::pending().await
    }

    async fn get_switchover(&self) -> keeper_dcs::Result<Option<Switchover>> {
        std::future::pending().await
    }

    async fn delete_switchover(&self) -> keeper_dcs::Result<()> {
        std::future::pending().await
    }
}

struct Fixture {
    dcs: MemoryDcs,
    engine: MockEngineManager,
    registry: Registry,
}

async fn fixture() -> Fixture {
    let cluster = Cluster {
        name: "redis".to_string(),
        members: ["redis-0", "redis-1", "redis-2"]
            .into_iter()
            .map(|name| Member {
                name: name.to_string(),
                ..Member::default()
            })
            .collect(),
        leader: Some(Leader {
            name: "redis-0".to_string(),
            ..Leader::default()
        }),
        ..Cluster::default()
    };
    let dcs = MemoryDcs::new(cluster);
    let engine = MockEngineManager::new("redis-1");

    let ctx = InitContext {
        dcs: Arc::new(dcs.clone()),
        events: Arc::new(MemoryEventSink::new()),
        engines: EngineResolver::new().with_builtin(Arc::new(engine.clone())),
        settings: Settings {
            pod_name: "redis-1".to_string(),
            ..Settings::default()
        },
        volume_stats: None,
    };

    let mut builder = RegistryBuilder::with_builtin_operations().unwrap();
    builder
        .register(Sleepy {
            base: OperationBase::new("sleepy"),
        })
        .unwrap();
    let registry = builder.build(&ctx).await.unwrap();

    Fixture {
        dcs,
        engine,
        registry,
    }
}

async fn call(registry: &Registry, method: Method, uri: &str, body: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router(registry).oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, headers, value)
}

#[tokio::test]
async fn test_readonly_operation_is_get() {
    let fixture = fixture().await;
    fixture.engine.set_role("secondary");

    let (status, headers, body) = call(&fixture.registry, Method::GET, "/v1.0/getrole", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "secondary");
    assert_eq!(headers["kb.operation"], "getrole");
    assert!(headers.contains_key("kb.starttime"));
    assert!(headers.contains_key("kb.endtime"));

    let (status, _, _) = call(&fixture.registry, Method::POST, "/v1.0/getrole", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_query_parameters_reach_operation() {
    let fixture = fixture().await;

    let (status, _, body) =
        call(&fixture.registry, Method::GET, "/v1.0/checkrole?role=primary", "").await;

    // The first observed role is a change.
    assert_eq!(status.as_u16(), 451);
    assert_eq!(body["errorCode"], "ERR_PROBE_FAILED");
    assert_eq!(fixture.engine.calls("get_replica_role"), 0);
}

#[tokio::test]
async fn test_switchover_precheck_failure() {
    let fixture = fixture().await;
    let body = json!({ "parameters": { "primary": "redis-2" } }).to_string();

    let (status, _, body) = call(&fixture.registry, Method::POST, "/v1.0/switchover", &body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errorCode"], "ERR_PRECHECK_FAILED");
    assert_eq!(body["message"], "redis-2 is not the primary");
    assert_eq!(fixture.dcs.create_switchover_calls(), 0);
}

#[tokio::test]
async fn test_switchover_records_intent() {
    let fixture = fixture().await;
    let body = json!({ "parameters": { "primary": "redis-0", "candidate": "redis-1" } }).to_string();

    let (status, _, _) = call(&fixture.registry, Method::POST, "/v1.0/switchover", &body).await;

    assert_eq!(status, StatusCode::OK);
    let history = fixture.dcs.switchover_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].leader.as_str(), history[0].candidate.as_str()), ("redis-0", "redis-1"));
}

#[tokio::test]
async fn test_malformed_body() {
    let fixture = fixture().await;

    let (status, _, body) = call(&fixture.registry, Method::POST, "/v1.0/lockinstance", "{nope").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "ERR_MALFORMED_REQUEST");
    assert!(!fixture.engine.is_locked());
}

#[tokio::test]
async fn test_empty_body_is_empty_request() {
    let fixture = fixture().await;

    let (status, _, body) = call(&fixture.registry, Method::POST, "/v1.0/lockinstance", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "manual");
    assert!(fixture.engine.is_locked());
}

#[tokio::test]
async fn test_no_response_is_no_content() {
    let fixture = fixture().await;

    // Volume protection without watched volumes does nothing.
    let (status, _, body) =
        call(&fixture.registry, Method::POST, "/v1.0/volumeprotection", "").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_operation_timeout() {
    let fixture = fixture().await;

    let (status, _, body) = call(&fixture.registry, Method::POST, "/v1.0/sleepy", "").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorCode"], "ERR_OPERATION_TIMEOUT");
}

#[tokio::test]
async fn test_unknown_action() {
    let fixture = fixture().await;

    let (status, _, _) = call(&fixture.registry, Method::POST, "/v1.0/dropdatabase", "").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_lifecycle() {
    let fixture = fixture().await;
    let server = DispatchServer::new("127.0.0.1:0".parse().unwrap(), &fixture.registry);

    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let stream = tokio::net::TcpStream::connect(addr).await;
    assert!(stream.is_ok());

    assert!(server.start().await.is_err());
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stalled_store_times_out_precheck() {
    let ctx = InitContext {
        dcs: Arc::new(StalledDcs),
        events: Arc::new(MemoryEventSink::new()),
        engines: EngineResolver::new().with_builtin(Arc::new(MockEngineManager::new("pg-0"))),
        settings: Settings {
            pod_name: "pg-0".to_string(),
            ..Settings::default()
        },
        volume_stats: None,
    };
    let registry = RegistryBuilder::with_builtin_operations()
        .unwrap()
        .build(&ctx)
        .await
        .unwrap();
    registry
        .require("switchover")
        .unwrap()
        .set_timeout(Duration::from_millis(100));
    let body = json!({ "parameters": { "candidate": "pg-1" } }).to_string();

    let (status, _, body) = tokio::time::timeout(
        Duration::from_secs(3),
        call(&registry, Method::POST, "/v1.0/switchover", &body),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorCode"], "ERR_OPERATION_TIMEOUT");
}
