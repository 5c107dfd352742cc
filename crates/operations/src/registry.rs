use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation};
use crate::ops;

/// Collects operations during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    operations: Vec<Box<dyn Operation>>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding every built-in operation.
    ///
    /// # Errors
    ///
    /// Fails only if two built-ins share an action.
    pub fn with_builtin_operations() -> Result<Self> {
        let mut builder = Self::new();
        for operation in ops::builtin() {
            builder.register_boxed(operation)?;
        }
        Ok(builder)
    }

    /// Adds an operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateOperation`] if the action is already taken.
    pub fn register<O: Operation>(&mut self, operation: O) -> Result<()> {
        self.register_boxed(Box::new(operation))
    }

    fn register_boxed(&mut self, operation: Box<dyn Operation>) -> Result<()> {
        let action = operation.action();
        if self.operations.iter().any(|op| op.action() == action) {
            return Err(Error::DuplicateOperation(action));
        }

        self.operations.push(operation);
        Ok(())
    }

    /// Runs every operation's `init` once and freezes the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first `init` failure.
    pub async fn build(self, ctx: &InitContext) -> Result<Registry> {
        let mut operations = BTreeMap::new();

        for mut operation in self.operations {
            operation.init(ctx).await?;
            info!(operation = operation.action(), "operation initialized");
            operations.insert(operation.action(), Arc::from(operation));
        }

        Ok(Registry { operations })
    }
}

/// Immutable catalog of initialized operations.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    operations: BTreeMap<&'static str, Arc<dyn Operation>>,
}

impl Registry {
    /// Looks up an operation by action.
    #[must_use]
    pub fn get(&self, action: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(action).cloned()
    }

    /// Looks up an operation, failing with [`Error::UnknownOperation`].
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is registered under `action`.
    pub fn require(&self, action: &str) -> Result<Arc<dyn Operation>> {
        self.get(action)
            .ok_or_else(|| Error::UnknownOperation(action.to_string()))
    }

    /// Every operation, ordered by action.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Operation>)> {
        self.operations.iter().map(|(action, op)| (*action, op))
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
