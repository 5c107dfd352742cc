use async_trait::async_trait;

use super::GET_ROLE;
use crate::error::Result;
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Reads the current replication role without tracking changes.
pub struct GetRole {
    base: OperationBase,
}

impl GetRole {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(GET_ROLE),
        }
    }
}

impl Default for GetRole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for GetRole {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)?;
        self.base.set_timeout(ctx.settings.probe.role_check_timeout());
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        true
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        let cluster = self.base.dcs()?.get_cluster_from_cache().await?;
        let role = self.base.engine()?.get_replica_role(&cluster).await?;

        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", GET_ROLE)
                .with("role", role),
        ))
    }
}
