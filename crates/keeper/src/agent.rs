use std::net::SocketAddr;
use std::sync::Arc;

use keeper_bootable::{Bootable, Services};
use keeper_dcs_memory::MemoryDcs;
use keeper_dispatch::DispatchServer;
use keeper_engine::{EngineManager, EngineResolver};
use keeper_engine_command::CommandEngineManager;
use keeper_engine_mock::MockEngineManager;
use keeper_engine_rpc::RemoteEngineManager;
use keeper_events::{EventSink, HttpEventSink, TracingEventSink};
use keeper_health::{HealthServer, health_server};
use keeper_operations::ops::CHECK_ROLE;
use keeper_operations::{InitContext, Registry, RegistryBuilder, RoleSubscription};
use keeper_scheduler::Scheduler;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};

/// Built-in engine managers by name.
fn builtin_engine(kind: &str, member: &str) -> Result<Arc<dyn EngineManager>> {
    match kind {
        "mock" => Ok(Arc::new(MockEngineManager::new(member))),
        other => Err(Error::UnknownEngine(other.to_string())),
    }
}

async fn engine_resolver(config: &Config) -> Result<EngineResolver> {
    let mut resolver = EngineResolver::new();

    if let Some(kind) = &config.engine {
        info!("using built-in engine {}", kind);
        resolver = resolver.with_builtin(builtin_engine(kind, &config.pod_name)?);
    }

    if let Some(remote) = &config.remote_engine {
        info!("connecting to remote engine at {}", remote.addr);
        let engine = RemoteEngineManager::connect(remote.addr, remote.timeout()).await?;
        resolver = resolver.with_remote(Arc::new(engine));
    }

    for (action, command) in &config.commands {
        info!("action {} runs {:?}", action, command);
        let engine = CommandEngineManager::new(config.pod_name.clone(), command.clone())?;
        resolver = resolver.with_command(action.clone(), Arc::new(engine));
    }

    Ok(resolver)
}

/// Every running service of the agent.
pub struct Agent {
    services: Services,
    registry: Registry,
    dispatch: Arc<DispatchServer>,
    health: Arc<HealthServer>,
}

impl Agent {
    /// Wires and starts every service described by `config`.
    pub async fn start(config: &Config) -> Result<Self> {
        let engines = engine_resolver(config).await?;

        let events: Arc<dyn EventSink> = match &config.events.endpoint {
            Some(endpoint) => Arc::new(HttpEventSink::new(endpoint.clone())),
            None => Arc::new(TracingEventSink),
        };

        let ctx = InitContext {
            dcs: Arc::new(MemoryDcs::new(config.initial_cluster())),
            events,
            engines: engines.clone(),
            settings: config.settings(),
            volume_stats: None,
        };

        let registry = RegistryBuilder::with_builtin_operations()?.build(&ctx).await?;
        info!("{} operations registered", registry.len());

        let check_role = registry.require(CHECK_ROLE)?;
        let dispatch = Arc::new(DispatchServer::new(config.dispatch.listen_addr, &registry));
        let health = Arc::new(health_server(config.health.listen_addr, check_role.clone()));
        let scheduler = Arc::new(Scheduler::new(&registry, &config.jobs)?);

        let mut agent = Self {
            services: Services::new(),
            registry,
            dispatch: dispatch.clone(),
            health: health.clone(),
        };

        agent.start_service(dispatch).await?;
        agent.start_service(health).await?;
        agent.start_service(scheduler).await?;

        if let Some(bound) = engines.resolve(CHECK_ROLE) {
            if bound.engine.capabilities().role_subscription {
                let subscription = RoleSubscription::new(bound.engine, check_role);
                agent.start_service(Arc::new(subscription)).await?;
            }
        }

        Ok(agent)
    }

    async fn start_service(&mut self, service: Arc<dyn Bootable>) -> Result<()> {
        let name = service.name().to_string();
        if let Err(e) = self.services.start(service).await {
            self.services.shutdown_all().await;
            return Err(Error::Start(name, e));
        }
        Ok(())
    }

    /// Registered operations.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bound address of the HTTP surface.
    pub fn dispatch_addr(&self) -> Option<SocketAddr> {
        self.dispatch.local_addr()
    }

    /// Bound address of the health surface.
    pub fn health_addr(&self) -> Option<SocketAddr> {
        self.health.local_addr()
    }

    /// Stops every service, most recently started first.
    pub async fn shutdown(mut self) {
        self.services.shutdown_all().await;
    }
}
