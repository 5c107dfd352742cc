use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use keeper_dcs::{Cluster, Leader, Member};
use keeper_dcs_memory::MemoryDcs;
use keeper_engine::EngineResolver;
use keeper_engine_mock::MockEngineManager;
use keeper_events::MemoryEventSink;
use keeper_operations::ops::{CHECK_ROLE, HEALTHY_CHECK, SWITCHOVER};
use keeper_operations::{
    Error, InitContext, OpsEvent, OpsRequest, OpsResponse, Operation, OperationBase,
    RegistryBuilder, Result, Settings,
};

fn context(engine: Option<MockEngineManager>) -> InitContext {
    let cluster = Cluster {
        name: "mysql".to_string(),
        replicas: 2,
        members: vec![
            Member {
                name: "mysql-0".to_string(),
                ..Member::default()
            },
            Member {
                name: "mysql-1".to_string(),
                ..Member::default()
            },
        ],
        leader: Some(Leader {
            name: "mysql-0".to_string(),
            ..Leader::default()
        }),
        ..Cluster::default()
    };

    let mut engines = EngineResolver::new();
    if let Some(engine) = engine {
        engines = engines.with_builtin(Arc::new(engine));
    }

    InitContext {
        dcs: Arc::new(MemoryDcs::new(cluster)),
        events: Arc::new(MemoryEventSink::new()),
        engines,
        settings: Settings {
            pod_name: "mysql-1".to_string(),
            ..Settings::default()
        },
        volume_stats: None,
    }
}

struct Echo {
    base: OperationBase,
}

impl Echo {
    fn new(action: &'static str) -> Self {
        Self {
            base: OperationBase::new(action),
        }
    }
}

#[async_trait]
impl Operation for Echo {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind(ctx);
        Ok(())
    }

    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>> {
        let message = request.get_str("message").unwrap_or_default().to_string();
        Ok(Some(OpsResponse::new(OpsEvent::Success).with("message", message)))
    }
}

#[tokio::test]
async fn test_builtin_catalog() {
    let registry = RegistryBuilder::with_builtin_operations()
        .unwrap()
        .build(&context(Some(MockEngineManager::new("mysql-1"))))
        .await
        .unwrap();

    let actions: Vec<&str> = registry.iter().map(|(action, _)| action).collect();
    for expected in [
        "checkrole",
        "getrole",
        "healthycheck",
        "checkrunning",
        "switchover",
        "leavemember",
        "joinmember",
        "lockinstance",
        "unlockinstance",
        "volumeprotection",
        "postprovision",
        "preterminate",
        "createuser",
        "deleteuser",
        "describeuser",
        "listusers",
        "listsystemaccounts",
        "grantuserrole",
        "revokeuserrole",
    ] {
        assert!(actions.contains(&expected), "{expected} missing from {actions:?}");
    }
    assert_eq!(registry.len(), 19);

    assert!(registry.require(CHECK_ROLE).unwrap().is_readonly());
    assert!(registry.require(HEALTHY_CHECK).unwrap().is_readonly());
    assert!(!registry.require(SWITCHOVER).unwrap().is_readonly());
}

#[tokio::test]
async fn test_duplicate_action_is_rejected() {
    let mut builder = RegistryBuilder::with_builtin_operations().unwrap();

    assert_matches!(
        builder.register(Echo::new(CHECK_ROLE)),
        Err(Error::DuplicateOperation(action)) if action == CHECK_ROLE
    );
}

#[tokio::test]
async fn test_custom_operation() {
    let mut builder = RegistryBuilder::new();
    builder.register(Echo::new("echo")).unwrap();
    let registry = builder.build(&context(None)).await.unwrap();

    let response = registry
        .require("echo")
        .unwrap()
        .run(OpsRequest::with_parameters([("message", "hi")]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.data["message"], "hi");
    assert_matches!(registry.require("missing"), Err(Error::UnknownOperation(_)));
}

#[tokio::test]
async fn test_builtins_need_an_engine() {
    let result = RegistryBuilder::with_builtin_operations()
        .unwrap()
        .build(&context(None))
        .await;

    assert_matches!(result, Err(Error::NoEngineManager(_)));
}
