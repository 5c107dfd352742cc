use async_trait::async_trait;
use tracing::info;

use super::LEAVE_MEMBER;
use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Removes the local member from the cluster in two phases.
///
/// The member is first marked `deleting` in the HA config, then the engine
/// removes it, then the mark moves to `deleted`. A retry after a crash between
/// phases skips the mark and repeats the engine call, so the engine side must
/// tolerate a repeated leave.
pub struct LeaveMember {
    base: OperationBase,
}

impl LeaveMember {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(LEAVE_MEMBER),
        }
    }
}

impl Default for LeaveMember {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for LeaveMember {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        let dcs = self.base.dcs()?;
        let engine = self.base.engine()?;

        let mut cluster = dcs.get_cluster().await?;
        let name = engine.get_current_member_name();
        let member = cluster
            .get_member_with_name(&name)
            .cloned()
            .ok_or_else(|| Error::MemberNotFound(name.clone()))?;

        if !cluster.ha_config.is_deleting(&member) {
            info!("marking member {} for deletion", name);
            cluster.ha_config.add_member_to_delete(&member);
            dcs.update_ha_config(&cluster.ha_config).await?;
        }

        engine.leave_member_from_cluster(&cluster, &name).await?;

        if cluster.ha_config.is_deleting(&member) {
            cluster.ha_config.finish_deleted(&member);
            dcs.update_ha_config(&cluster.ha_config).await?;
        }
        info!("member {} left the cluster", name);

        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", LEAVE_MEMBER)
                .with("member", name),
        ))
    }
}
