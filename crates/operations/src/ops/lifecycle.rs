use std::fmt;

use async_trait::async_trait;
use tracing::info;

use super::{POST_PROVISION, PRE_TERMINATE};
use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Lifecycle hook an engine may implement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleHook {
    /// After the component is provisioned.
    PostProvision,

    /// Before the pod is terminated.
    PreTerminate,
}

impl LifecycleHook {
    const fn action(self) -> &'static str {
        match self {
            Self::PostProvision => POST_PROVISION,
            Self::PreTerminate => PRE_TERMINATE,
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// Runs one lifecycle hook on the engine.
pub struct Lifecycle {
    base: OperationBase,
    hook: LifecycleHook,
}

impl Lifecycle {
    /// Creates the operation for `hook`.
    #[must_use]
    pub fn new(hook: LifecycleHook) -> Self {
        Self {
            base: OperationBase::new(hook.action()),
            hook,
        }
    }

    fn supported(&self) -> bool {
        let capabilities = self.base.capabilities();
        match self.hook {
            LifecycleHook::PostProvision => capabilities.post_provision,
            LifecycleHook::PreTerminate => capabilities.pre_terminate,
        }
    }
}

#[async_trait]
impl Operation for Lifecycle {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        if !self.supported() {
            return Err(Error::NotImplemented(self.hook.to_string()));
        }

        let engine = self.base.engine()?;
        match self.hook {
            LifecycleHook::PostProvision => {
                let cluster = self.base.dcs()?.get_cluster().await?;
                engine.post_provision(&cluster).await?;
            }
            LifecycleHook::PreTerminate => engine.pre_terminate().await?,
        }
        info!("{} hook finished", self.hook);

        Ok(Some(
            OpsResponse::new(OpsEvent::Success).with("operation", self.hook.action()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{Harness, cluster};

    use assert_matches::assert_matches;
    use keeper_engine::Capabilities;
    use keeper_engine_mock::MockEngineManager;

    #[tokio::test]
    async fn test_hooks_call_engine() {
        let harness = Harness::new("etcd-0", cluster(&["etcd-0"], "etcd-0"));
        for hook in [LifecycleHook::PostProvision, LifecycleHook::PreTerminate] {
            let mut op = Lifecycle::new(hook);
            op.init(&harness.ctx()).await.unwrap();
            op.run(OpsRequest::default()).await.unwrap();
        }

        assert_eq!(harness.engine.call_log(), vec!["post_provision", "pre_terminate"]);
    }

    #[tokio::test]
    async fn test_missing_capability() {
        let mut harness = Harness::new("etcd-0", cluster(&["etcd-0"], "etcd-0"));
        harness.engine = MockEngineManager::new("etcd-0").with_capabilities(Capabilities::default());
        let mut op = Lifecycle::new(LifecycleHook::PreTerminate);
        op.init(&harness.ctx()).await.unwrap();

        assert_matches!(op.run(OpsRequest::default()).await, Err(Error::NotImplemented(_)));
        assert_eq!(harness.engine.calls("pre_terminate"), 0);
    }
}
