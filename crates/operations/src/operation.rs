use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keeper_dcs::Dcs;
use keeper_engine::{BoundEngine, Capabilities, EngineManager, EngineResolver, Strategy};
use keeper_events::{EventSink, EventSource};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::reporter::EventEmitter;
use crate::request::{OpsRequest, OpsResponse};
use crate::settings::Settings;
use crate::volume::VolumeStatsRequester;

/// Timeout an operation starts with.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Component name stamped on emitted events.
pub const EVENT_COMPONENT: &str = "keeper";

/// Everything an operation may bind during `init`.
#[derive(Clone)]
pub struct InitContext {
    /// Cluster-state store.
    pub dcs: Arc<dyn Dcs>,

    /// Event destination.
    pub events: Arc<dyn EventSink>,

    /// Engine-manager strategies.
    pub engines: EngineResolver,

    /// Static settings.
    pub settings: Settings,

    /// Volume stats source. Built from the kubelet settings when absent.
    pub volume_stats: Option<Arc<dyn VolumeStatsRequester>>,
}

impl InitContext {
    /// Emitter stamping events with this pod's identity.
    #[must_use]
    pub fn event_emitter(&self) -> EventEmitter {
        EventEmitter::new(
            self.events.clone(),
            EventSource {
                pod_name: self.settings.pod_name.clone(),
                namespace: self.settings.namespace.clone(),
                component: EVENT_COMPONENT.to_string(),
            },
        )
    }
}

/// A named, stateful unit of control logic.
///
/// `init` runs exactly once, from [`crate::RegistryBuilder::build`], before the
/// operation is shared. Everything after that goes through `&self`.
#[async_trait]
pub trait Operation
where
    Self: Send + Sync + 'static,
{
    /// Shared per-operation state.
    fn base(&self) -> &OperationBase;

    /// Unique action name, used as the registry key and route.
    fn action(&self) -> &'static str {
        self.base().action()
    }

    /// Binds collaborators.
    async fn init(&mut self, ctx: &InitContext) -> Result<()>;

    /// Replaces the timeout.
    fn set_timeout(&self, timeout: Duration) {
        self.base().set_timeout(timeout);
    }

    /// Current timeout.
    fn timeout(&self) -> Duration {
        self.base().timeout()
    }

    /// Whether the operation only reads state.
    fn is_readonly(&self) -> bool {
        false
    }

    /// Validates `request` before anything changes.
    async fn pre_check(&self, _request: &OpsRequest) -> Result<()> {
        Ok(())
    }

    /// Runs the operation.
    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>>;
}

/// State every operation carries: its action, timeout and bound collaborators.
pub struct OperationBase {
    action: &'static str,
    timeout: RwLock<Duration>,
    engine: Option<BoundEngine>,
    dcs: Option<Arc<dyn Dcs>>,
    events: Option<EventEmitter>,
}

impl fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("action", &self.action())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for OperationBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationBase")
            .field("action", &self.action)
            .field("timeout", &*self.timeout.read())
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl OperationBase {
    /// Creates the state for `action` with [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            timeout: RwLock::new(DEFAULT_TIMEOUT),
            engine: None,
            dcs: None,
            events: None,
        }
    }

    /// The action name.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        self.action
    }

    /// Replaces the timeout.
    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
    }

    /// Current timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    /// Binds the store and event emitter.
    pub fn bind(&mut self, ctx: &InitContext) {
        self.dcs = Some(ctx.dcs.clone());
        self.events = Some(ctx.event_emitter());
    }

    /// Binds the store, the event emitter and an engine manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEngineManager`] when no strategy applies.
    pub fn bind_with_engine(&mut self, ctx: &InitContext) -> Result<()> {
        self.bind(ctx);

        let bound = ctx
            .engines
            .resolve(self.action)
            .ok_or(Error::NoEngineManager(self.action))?;
        debug!(
            operation = self.action,
            strategy = %bound.strategy,
            "engine manager bound"
        );
        self.engine = Some(bound);

        Ok(())
    }

    /// The bound engine manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before a successful bind.
    pub fn engine(&self) -> Result<&Arc<dyn EngineManager>> {
        self.engine
            .as_ref()
            .map(|bound| &bound.engine)
            .ok_or(Error::NotInitialized(self.action))
    }

    /// Strategy that bound the engine manager.
    #[must_use]
    pub fn strategy(&self) -> Option<Strategy> {
        self.engine.as_ref().map(|bound| bound.strategy)
    }

    /// Capabilities of the bound engine manager; none when unbound.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.engine
            .as_ref()
            .map(|bound| bound.engine.capabilities())
            .unwrap_or_default()
    }

    /// The bound store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before a bind.
    pub fn dcs(&self) -> Result<&Arc<dyn Dcs>> {
        self.dcs.as_ref().ok_or(Error::NotInitialized(self.action))
    }

    /// The bound event emitter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before a bind.
    pub fn events(&self) -> Result<&EventEmitter> {
        self.events.as_ref().ok_or(Error::NotInitialized(self.action))
    }
}
