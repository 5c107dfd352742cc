use async_trait::async_trait;
use keeper_dcs::Cluster;
use keeper_events::EventType;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::HEALTHY_CHECK;
use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::reporter::FailureReporter;
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Consecutive leader-check failures tolerated before a failover is attempted.
pub const LEADER_FAILURE_THRESHOLD: u32 = 3;

/// Checks the local member and, on followers, the leader.
///
/// After more than [`LEADER_FAILURE_THRESHOLD`] consecutive leader failures the
/// local member asks the engine to fail over to itself.
pub struct HealthCheck {
    base: OperationBase,
    member_failures: FailureReporter,
    leader_failures: Mutex<u32>,
}

impl HealthCheck {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(HEALTHY_CHECK),
            member_failures: FailureReporter::new(1),
            leader_failures: Mutex::new(0),
        }
    }

    fn reset(&self) {
        self.member_failures.reset();
        *self.leader_failures.lock() = 0;
    }

    async fn member_unhealthy(&self, error: Error) -> Result<Option<OpsResponse>> {
        let message = error.to_string();
        warn!("current member is unhealthy: {}", message);

        if self.member_failures.record_failure() {
            let response = OpsResponse::new(OpsEvent::Failed)
                .with("operation", HEALTHY_CHECK)
                .with("message", message.clone());
            self.base
                .events()?
                .emit_or_log(HEALTHY_CHECK, EventType::Warning, &response.data)
                .await;
        }

        Err(Error::Probe(message))
    }

    async fn leader_unhealthy(&self, cluster: &Cluster, error: Error) -> Result<Option<OpsResponse>> {
        let failures = {
            let mut failures = self.leader_failures.lock();
            *failures += 1;
            *failures
        };
        warn!("leader is unhealthy ({} consecutive): {}", failures, error);

        if failures > LEADER_FAILURE_THRESHOLD {
            let engine = self.base.engine()?;
            if engine.capabilities().failover {
                let candidate = engine.get_current_member_name();
                info!("leader failed {} checks, failing over to {}", failures, candidate);
                engine.failover(cluster, &candidate).await?;
                *self.leader_failures.lock() = 0;
            } else {
                warn!("leader failed {} checks but failover is not supported", failures);
            }
        }

        Err(Error::Probe(error.to_string()))
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for HealthCheck {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)?;
        self.member_failures = FailureReporter::new(ctx.settings.probe.report_frequency());
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        true
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        let cluster = self.base.dcs()?.get_cluster().await?;
        let engine = self.base.engine()?;

        if let Err(e) = engine.current_member_healthy_check(&cluster).await {
            return self.member_unhealthy(e.into()).await;
        }
        self.member_failures.reset();

        if engine.is_leader(&cluster).await? {
            self.reset();
            return Ok(Some(
                OpsResponse::new(OpsEvent::Success)
                    .with("operation", HEALTHY_CHECK)
                    .with("message", "current member is the leader and healthy"),
            ));
        }

        if let Err(e) = engine.leader_healthy_check(&cluster).await {
            return self.leader_unhealthy(&cluster, e.into()).await;
        }

        self.reset();
        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", HEALTHY_CHECK)
                .with("message", "current member and leader are healthy"),
        ))
    }
}
