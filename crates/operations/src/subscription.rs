use std::sync::Arc;

use async_trait::async_trait;
use keeper_bootable::{Bootable, BootableError};
use keeper_engine::EngineManager;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::operation::Operation;
use crate::request::OpsRequest;

/// Forwards roles pushed by the engine into the role check.
///
/// Each pushed role runs the role check with a `role` parameter, so pushed
/// and polled changes share one last-observed role and one event stream.
pub struct RoleSubscription {
    engine: Arc<dyn EngineManager>,
    check_role: Arc<dyn Operation>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl RoleSubscription {
    /// Creates a subscription feeding `check_role` from `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn EngineManager>, check_role: Arc<dyn Operation>) -> Self {
        Self {
            engine,
            check_role,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }
}

#[async_trait]
impl Bootable for RoleSubscription {
    fn name(&self) -> &str {
        "role-subscription"
    }

    async fn start(&self) -> Result<(), BootableError> {
        let mut roles = self.engine.subscribe_roles().await.map_err(Error::from)?;

        let check_role = self.check_role.clone();
        let shutdown_token = self.shutdown_token.clone();

        self.task_tracker.spawn(async move {
            loop {
                tokio::select! {
                    role = roles.recv() => {
                        let Some(role) = role else {
                            info!("role subscription closed by engine");
                            break;
                        };
                        debug!("role pushed: {}", role);

                        let request = OpsRequest::with_parameters([("role", role)]);
                        match check_role.run(request).await {
                            Ok(_) => {}
                            Err(Error::Probe(change)) => info!("pushed role change: {}", change),
                            Err(e) => warn!("pushed role check failed: {}", e),
                        }
                    }
                    () = shutdown_token.cancelled() => break,
                }
            }
        });

        self.task_tracker.close();

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BootableError> {
        info!("role-subscription shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("role-subscription shutdown");

        Ok(())
    }

    async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}
