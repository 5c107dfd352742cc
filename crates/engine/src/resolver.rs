use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::EngineManager;

/// How an operation reaches the database.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// A literal command configured for the operation's action.
    Command,

    /// An engine manager reached over the side-channel procedure interface.
    Remote,

    /// The engine manager built into this process.
    Builtin,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => write!(f, "command"),
            Self::Remote => write!(f, "remote"),
            Self::Builtin => write!(f, "builtin"),
        }
    }
}

/// An engine manager bound to one operation.
#[derive(Clone)]
pub struct BoundEngine {
    /// Strategy that produced the binding.
    pub strategy: Strategy,

    /// The bound engine manager.
    pub engine: Arc<dyn EngineManager>,
}

impl fmt::Debug for BoundEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundEngine")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Chooses the engine manager for each action.
///
/// Priority: a command configured for the action, then the remote engine
/// manager, then the built-in one.
#[derive(Clone, Default)]
pub struct EngineResolver {
    commands: BTreeMap<String, Arc<dyn EngineManager>>,
    remote: Option<Arc<dyn EngineManager>>,
    builtin: Option<Arc<dyn EngineManager>>,
}

impl EngineResolver {
    /// Creates a resolver with nothing bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a command-executing engine manager to `action`.
    #[must_use]
    pub fn with_command(mut self, action: impl Into<String>, engine: Arc<dyn EngineManager>) -> Self {
        self.commands.insert(action.into(), engine);
        self
    }

    /// Sets the remote engine manager.
    #[must_use]
    pub fn with_remote(mut self, engine: Arc<dyn EngineManager>) -> Self {
        self.remote = Some(engine);
        self
    }

    /// Sets the built-in engine manager.
    #[must_use]
    pub fn with_builtin(mut self, engine: Arc<dyn EngineManager>) -> Self {
        self.builtin = Some(engine);
        self
    }

    /// The built-in engine manager, if any.
    #[must_use]
    pub fn builtin(&self) -> Option<&Arc<dyn EngineManager>> {
        self.builtin.as_ref()
    }

    /// Resolves the engine manager for `action`.
    #[must_use]
    pub fn resolve(&self, action: &str) -> Option<BoundEngine> {
        if let Some(engine) = self.commands.get(action) {
            return Some(BoundEngine {
                strategy: Strategy::Command,
                engine: engine.clone(),
            });
        }

        if let Some(engine) = &self.remote {
            return Some(BoundEngine {
                strategy: Strategy::Remote,
                engine: engine.clone(),
            });
        }

        self.builtin.as_ref().map(|engine| BoundEngine {
            strategy: Strategy::Builtin,
            engine: engine.clone(),
        })
    }
}
