use async_trait::async_trait;
use tracing::info;

use super::JOIN_MEMBER;
use crate::error::Result;
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Asks the engine to add the local member to the cluster.
pub struct JoinMember {
    base: OperationBase,
}

impl JoinMember {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(JOIN_MEMBER),
        }
    }
}

impl Default for JoinMember {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for JoinMember {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        let cluster = self.base.dcs()?.get_cluster().await?;
        let engine = self.base.engine()?;

        engine.join_current_member_to_cluster(&cluster).await?;
        let name = engine.get_current_member_name();
        info!("member {} joined the cluster", name);

        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", JOIN_MEMBER)
                .with("member", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::testing::{Harness, cluster};

    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_join() {
        let harness = Harness::new("mongo-3", cluster(&["mongo-0", "mongo-3"], "mongo-0"));
        let mut op = JoinMember::new();
        op.init(&harness.ctx()).await.unwrap();

        let response = op.run(OpsRequest::default()).await.unwrap().unwrap();

        assert_eq!(response.data["member"], "mongo-3");
        assert_eq!(harness.engine.calls("join_current_member_to_cluster"), 1);
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let harness = Harness::new("mongo-3", cluster(&["mongo-0"], "mongo-0"));
        harness.dcs.set_unavailable(true);
        let mut op = JoinMember::new();
        op.init(&harness.ctx()).await.unwrap();

        assert_matches!(op.run(OpsRequest::default()).await, Err(Error::Dcs(_)));
        assert_eq!(harness.engine.calls("join_current_member_to_cluster"), 0);
    }
}
