//! Lifecycle interface shared by the agent's long-running services.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

/// Boxed error returned by lifecycle calls.
pub type BootableError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for bootable services.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// Get the name of the bootable service.
    fn name(&self) -> &str;

    /// Start the bootable service.
    async fn start(&self) -> Result<(), BootableError>;

    /// Shutdown the bootable service.
    async fn shutdown(&self) -> Result<(), BootableError>;

    /// Wait for the bootable service to exit.
    async fn wait(&self);
}

/// Ordered collection of started services.
///
/// Services are shut down in reverse start order, so anything started later
/// (and possibly depending on an earlier service) goes first.
#[derive(Default)]
pub struct Services {
    started: Vec<Arc<dyn Bootable>>,
}

impl Services {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `service` and records it for later shutdown.
    ///
    /// # Errors
    ///
    /// Returns the service's start error. Services started before it stay
    /// recorded, so the caller can still shut them down.
    pub async fn start(&mut self, service: Arc<dyn Bootable>) -> Result<(), BootableError> {
        info!("starting {}...", service.name());
        service.start().await?;
        info!("{} started", service.name());
        self.started.push(service);
        Ok(())
    }

    /// Number of started services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// Whether no service has been started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// Shuts every service down in reverse start order.
    ///
    /// Shutdown errors are logged and do not stop the remaining services from
    /// being shut down.
    pub async fn shutdown_all(&mut self) {
        while let Some(service) = self.started.pop() {
            if let Err(e) = service.shutdown().await {
                error!("failed to shut down {}: {}", service.name(), e);
            }
        }
    }
}
