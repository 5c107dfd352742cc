use async_trait::async_trait;
use tracing::info;

use super::{LOCK_INSTANCE, UNLOCK_INSTANCE};
use crate::error::Result;
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Reason passed to the engine when the request carries none.
const DEFAULT_LOCK_REASON: &str = "manual";

/// Switches the instance to read-only. Optional parameter: `reason`.
pub struct LockInstance {
    base: OperationBase,
}

impl LockInstance {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(LOCK_INSTANCE),
        }
    }
}

impl Default for LockInstance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for LockInstance {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>> {
        let reason = request.get_str("reason").unwrap_or(DEFAULT_LOCK_REASON);

        self.base.engine()?.lock(reason).await?;
        info!("instance locked: {}", reason);

        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", LOCK_INSTANCE)
                .with("reason", reason),
        ))
    }
}

/// Switches the instance back to read-write.
pub struct UnlockInstance {
    base: OperationBase,
}

impl UnlockInstance {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(UNLOCK_INSTANCE),
        }
    }
}

impl Default for UnlockInstance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for UnlockInstance {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        self.base.engine()?.unlock().await?;
        info!("instance unlocked");

        Ok(Some(
            OpsResponse::new(OpsEvent::Success).with("operation", UNLOCK_INSTANCE),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{Harness, cluster};

    #[tokio::test]
    async fn test_lock_then_unlock() {
        let harness = Harness::new("mysql-0", cluster(&["mysql-0"], "mysql-0"));
        let ctx = harness.ctx();
        let mut lock = LockInstance::new();
        let mut unlock = UnlockInstance::new();
        lock.init(&ctx).await.unwrap();
        unlock.init(&ctx).await.unwrap();

        lock.run(OpsRequest::default()).await.unwrap();
        assert!(harness.engine.is_locked());

        unlock.run(OpsRequest::default()).await.unwrap();
        assert!(!harness.engine.is_locked());
        assert_eq!(harness.engine.call_log(), vec!["lock:manual", "unlock"]);
    }

    #[tokio::test]
    async fn test_lock_reason_parameter() {
        let harness = Harness::new("mysql-0", cluster(&["mysql-0"], "mysql-0"));
        let mut lock = LockInstance::new();
        lock.init(&harness.ctx()).await.unwrap();

        lock.run(OpsRequest::with_parameters([("reason", "maintenance")]))
            .await
            .unwrap();

        assert_eq!(harness.engine.call_log(), vec!["lock:maintenance"]);
    }
}
