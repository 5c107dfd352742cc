use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use keeper_bootable::Bootable;
use keeper_dcs::{Cluster, Leader, Member};
use keeper_engine::{Capabilities, EngineManager, Error, RoleType, UserInfo};
use keeper_engine_mock::MockEngineManager;
use keeper_engine_rpc::{RemoteEngineManager, engine_rpc_server};

fn cluster() -> Cluster {
    Cluster {
        name: "etcd".to_string(),
        members: vec![
            Member {
                name: "etcd-0".to_string(),
                ..Member::default()
            },
            Member {
                name: "etcd-1".to_string(),
                ..Member::default()
            },
        ],
        leader: Some(Leader {
            name: "etcd-0".to_string(),
            ..Leader::default()
        }),
        ..Cluster::default()
    }
}

async fn remote(mock: &MockEngineManager) -> (RemoteEngineManager, impl Bootable) {
    let server = engine_rpc_server("127.0.0.1:0".parse().unwrap(), Arc::new(mock.clone()));
    let addr = server.serve().await.unwrap();
    let remote = RemoteEngineManager::connect(addr, Duration::from_secs(5))
        .await
        .unwrap();
    (remote, server)
}

#[tokio::test]
async fn test_forwards_core_calls() {
    let mock = MockEngineManager::new("etcd-1");
    mock.set_role("follower");
    let (remote, server) = remote(&mock).await;
    let cluster = cluster();

    assert_eq!(remote.get_current_member_name(), "etcd-1");
    assert_eq!(remote.get_replica_role(&cluster).await.unwrap(), "follower");
    assert!(remote.is_leader_member(&cluster, &cluster.members[0]).await.unwrap());
    assert!(remote.is_member_healthy(&cluster, &cluster.members[0]).await);

    remote.lock("disk full").await.unwrap();
    assert!(mock.is_locked());
    remote.unlock().await.unwrap();
    assert!(!mock.is_locked());

    assert_eq!(mock.call_log().first().map(String::as_str), Some("get_replica_role"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_engine_errors_cross_the_wire() {
    let mock = MockEngineManager::new("etcd-1");
    mock.fail("leave_member_from_cluster", Error::Failed("quorum lost".to_string()));
    let (remote, server) = remote(&mock).await;

    assert_matches!(
        remote.leave_member_from_cluster(&cluster(), "etcd-1").await,
        Err(Error::Failed(message)) if message == "quorum lost"
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_capabilities_read_at_connect() {
    let mock = MockEngineManager::new("etcd-1").with_capabilities(Capabilities {
        failover: true,
        role_subscription: true,
        ..Capabilities::default()
    });
    let (remote, server) = remote(&mock).await;

    let capabilities = remote.capabilities();
    assert!(capabilities.failover);
    assert!(!capabilities.accounts);
    assert!(!capabilities.role_subscription);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_account_calls() {
    let mock = MockEngineManager::new("etcd-1");
    let (remote, server) = remote(&mock).await;

    remote
        .create_user(&UserInfo {
            user_name: "app".to_string(),
            password: Some("secret".to_string()),
            ..UserInfo::default()
        })
        .await
        .unwrap();
    remote.grant_user_role("app", RoleType::ReadWrite).await.unwrap();

    let user = remote.describe_user("app").await.unwrap();
    assert_eq!(user.role_name, Some(RoleType::ReadWrite));
    assert!(user.password.is_none());
    assert_eq!(remote.list_users().await.unwrap().len(), 1);

    server.shutdown().await.unwrap();
}
