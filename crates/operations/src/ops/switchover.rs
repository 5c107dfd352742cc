use async_trait::async_trait;
use keeper_dcs::Cluster;
use tracing::info;

use super::SWITCHOVER;
use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Records a switchover intent after validating it against the cluster view.
///
/// Parameters: `primary` (alias `leader`) and `candidate`, at least one set.
pub struct Switchover {
    base: OperationBase,
}

/// Parameters of one switchover request.
struct Intent<'a> {
    primary: Option<&'a str>,
    candidate: Option<&'a str>,
}

impl<'a> Intent<'a> {
    fn from_request(request: &'a OpsRequest) -> Self {
        Self {
            primary: request.get_str("primary").or_else(|| request.get_str("leader")),
            candidate: request.get_str("candidate"),
        }
    }
}

impl Switchover {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(SWITCHOVER),
        }
    }

    async fn validate(&self, cluster: &Cluster, intent: &Intent<'_>) -> Result<()> {
        if intent.primary.is_none() && intent.candidate.is_none() {
            return Err(Error::PreCheck("primary or candidate must be set".to_string()));
        }

        if !cluster.is_ha_enabled() {
            return Err(Error::PreCheck("cluster's ha is disabled".to_string()));
        }

        let engine = self.base.engine()?;

        if let Some(primary) = intent.primary {
            let member = cluster
                .get_member_with_name(primary)
                .ok_or_else(|| Error::PreCheck(format!("primary {primary} not exists")))?;

            if !engine.is_leader_member(cluster, member).await? {
                return Err(Error::PreCheck(format!("{primary} is not the primary")));
            }
        }

        match intent.candidate {
            Some(candidate) => {
                let member = cluster
                    .get_member_with_name(candidate)
                    .ok_or_else(|| Error::PreCheck(format!("candidate {candidate} not exists")))?;

                if !engine.is_member_healthy(cluster, member).await {
                    return Err(Error::PreCheck(format!("candidate {candidate} is unhealthy")));
                }
            }
            None => {
                let leader = intent.primary.unwrap_or_default();
                if engine.has_other_healthy_members(cluster, leader).await.is_empty() {
                    return Err(Error::PreCheck(
                        "candidate is not set and has no other healthy members".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for Switchover {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for Switchover {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)
    }

    async fn pre_check(&self, request: &OpsRequest) -> Result<()> {
        let cluster = self.base.dcs()?.get_cluster().await?;
        self.validate(&cluster, &Intent::from_request(request)).await
    }

    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>> {
        let intent = Intent::from_request(&request);
        let primary = intent.primary.unwrap_or_default();
        let candidate = intent.candidate.unwrap_or_default();

        info!("creating switchover from {:?} to {:?}", primary, candidate);
        self.base.dcs()?.create_switchover(primary, candidate).await?;

        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", SWITCHOVER)
                .with("primary", primary)
                .with("candidate", candidate),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{Harness, cluster};

    use assert_matches::assert_matches;

    async fn switchover(harness: &Harness) -> Switchover {
        let mut op = Switchover::new();
        op.init(&harness.ctx()).await.unwrap();
        op
    }

    fn harness() -> Harness {
        Harness::new("pg-1", cluster(&["pg-0", "pg-1", "pg-2"], "pg-0"))
    }

    async fn pre_check_message(op: &Switchover, parameters: &[(&str, &str)]) -> String {
        let request = OpsRequest::with_parameters(parameters.iter().copied());
        match op.pre_check(&request).await {
            Err(Error::PreCheck(message)) => message,
            other => panic!("expected pre-check failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_request_creates_one_intent() {
        let harness = harness();
        let op = switchover(&harness).await;
        let request = OpsRequest::with_parameters([("primary", "pg-0"), ("candidate", "pg-2")]);

        op.pre_check(&request).await.unwrap();
        let response = op.run(request).await.unwrap().unwrap();

        assert_eq!(response.event(), Some(OpsEvent::Success));
        let history = harness.dcs.switchover_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].leader, "pg-0");
        assert_eq!(history[0].candidate, "pg-2");
    }

    #[tokio::test]
    async fn test_leader_alias() {
        let harness = harness();
        let op = switchover(&harness).await;
        let request = OpsRequest::with_parameters([("leader", "pg-0")]);

        op.pre_check(&request).await.unwrap();
        op.run(request).await.unwrap();

        let history = harness.dcs.switchover_history().await;
        assert_eq!(history[0].leader, "pg-0");
        assert_eq!(history[0].candidate, "");
    }

    #[tokio::test]
    async fn test_rejections() {
        let harness = harness();
        harness.engine.set_member_healthy("pg-2", false);
        let op = switchover(&harness).await;

        assert_eq!(pre_check_message(&op, &[]).await, "primary or candidate must be set");
        assert_eq!(
            pre_check_message(&op, &[("primary", "pg-9")]).await,
            "primary pg-9 not exists"
        );
        assert_eq!(
            pre_check_message(&op, &[("primary", "pg-1")]).await,
            "pg-1 is not the primary"
        );
        assert_eq!(
            pre_check_message(&op, &[("candidate", "pg-9")]).await,
            "candidate pg-9 not exists"
        );
        assert_eq!(
            pre_check_message(&op, &[("candidate", "pg-2")]).await,
            "candidate pg-2 is unhealthy"
        );
        assert_eq!(harness.dcs.create_switchover_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_healthy_candidate() {
        let harness = harness();
        harness.engine.set_current_member_healthy(false);
        harness.engine.set_member_healthy("pg-2", false);
        let op = switchover(&harness).await;

        assert_eq!(
            pre_check_message(&op, &[("primary", "pg-0")]).await,
            "candidate is not set and has no other healthy members"
        );
    }

    #[tokio::test]
    async fn test_disabled_ha_is_rejected() {
        let mut cluster = cluster(&["pg-0", "pg-1"], "pg-0");
        cluster.ha_config.enable = false;
        let harness = Harness::new("pg-1", cluster);
        let op = switchover(&harness).await;

        assert_eq!(
            pre_check_message(&op, &[("candidate", "pg-1")]).await,
            "cluster's ha is disabled"
        );
    }

    #[tokio::test]
    async fn test_pending_switchover_fails_run() {
        let harness = harness();
        let op = switchover(&harness).await;
        let request = OpsRequest::with_parameters([("candidate", "pg-2")]);

        op.run(request.clone()).await.unwrap();

        assert_matches!(
            op.run(request).await,
            Err(Error::Dcs(keeper_dcs::Error::SwitchoverPending(_)))
        );
    }
}
