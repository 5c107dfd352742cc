use async_trait::async_trait;
use keeper_events::EventType;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};

use super::CHECK_ROLE;
use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::reporter::FailureReporter;
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

/// Reads the replication role and reports changes.
///
/// A changed role is emitted as an event and returned as a probe error, so
/// readiness probes see the transition. A failed read never fails the caller;
/// it is counted and reported once every `failed_event_report_frequency`
/// consecutive failures. A `role` parameter (pushed by the engine) is used
/// instead of reading.
pub struct CheckRole {
    base: OperationBase,
    original_role: Mutex<String>,
    failures: FailureReporter,
    valid_roles: Vec<String>,
}

impl CheckRole {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(CHECK_ROLE),
            original_role: Mutex::new(String::new()),
            failures: FailureReporter::new(1),
            valid_roles: Vec::new(),
        }
    }

    async fn read_role(&self, request: &OpsRequest) -> Result<String> {
        if let Some(role) = request.get_str("role") {
            return Ok(role.to_string());
        }

        let cluster = self.base.dcs()?.get_cluster_from_cache().await?;
        let engine = self.base.engine()?;
        let timeout = self.timeout();

        tokio::time::timeout(timeout, engine.get_replica_role(&cluster))
            .await
            .map_err(|_| Error::Timeout(timeout))?
            .map_err(Error::from)
    }

    async fn read_failed(&self, error: &Error) -> Result<Option<OpsResponse>> {
        warn!("executing checkrole error: {}", error);

        let response = OpsResponse::new(OpsEvent::Failed)
            .with("operation", CHECK_ROLE)
            .with("originalRole", self.original_role.lock().clone())
            .with("message", error.to_string());

        if self.failures.record_failure() {
            info!(
                "role checks failed continuously, times: {}",
                self.failures.count()
            );
            self.base
                .events()?
                .emit_or_log(CHECK_ROLE, EventType::Warning, &response.data)
                .await;
        }

        Ok(Some(response))
    }

    fn is_valid_role(&self, role: &str) -> bool {
        self.valid_roles.is_empty() || self.valid_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

impl Default for CheckRole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for CheckRole {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)?;
        self.base.set_timeout(ctx.settings.probe.role_check_timeout());
        self.failures = FailureReporter::new(ctx.settings.probe.report_frequency());
        self.valid_roles.clone_from(&ctx.settings.probe.valid_roles);
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        true
    }

    async fn run(&self, request: OpsRequest) -> Result<Option<OpsResponse>> {
        let role = match self.read_role(&request).await {
            Ok(role) => role,
            Err(e) => return self.read_failed(&e).await,
        };

        self.failures.reset();

        if !self.is_valid_role(&role) {
            let message = format!("role {role} is not one of {:?}", self.valid_roles);
            return Ok(Some(
                OpsResponse::new(OpsEvent::Failed)
                    .with("operation", CHECK_ROLE)
                    .with("message", message),
            ));
        }

        let original_role = {
            let mut original = self.original_role.lock();
            if *original == role {
                None
            } else {
                Some(std::mem::replace(&mut *original, role.clone()))
            }
        };

        let Some(original_role) = original_role else {
            return Ok(Some(
                OpsResponse::new(OpsEvent::Success)
                    .with("operation", CHECK_ROLE)
                    .with("originalRole", role.clone())
                    .with("role", role),
            ));
        };

        info!("role changed from {:?} to {:?}", original_role, role);

        let detail = json!({
            "event": OpsEvent::Success.to_string(),
            "operation": CHECK_ROLE,
            "originalRole": original_role,
            "role": role,
        });

        if !role.is_empty() {
            self.base
                .events()?
                .emit_or_log(CHECK_ROLE, EventType::Normal, &detail)
                .await;
        }

        Err(Error::Probe(detail.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::settings::ProbeSettings;
    use crate::testing::{Harness, cluster};

    use assert_matches::assert_matches;
    use keeper_engine::Error as EngineError;

    async fn check_role(harness: &Harness) -> CheckRole {
        let mut op = CheckRole::new();
        op.init(&harness.ctx()).await.unwrap();
        op
    }

    fn harness() -> Harness {
        Harness::new("pg-0", cluster(&["pg-0", "pg-1"], "pg-0"))
    }

    #[tokio::test]
    async fn test_first_read_is_a_change() {
        let harness = harness();
        harness.engine.set_role("primary");
        let op = check_role(&harness).await;

        let result = op.run(OpsRequest::default()).await;

        let Err(Error::Probe(detail)) = result else {
            panic!("expected probe error, got {result:?}");
        };
        let detail: serde_json::Value = serde_json::from_str(&detail).unwrap();
        assert_eq!(detail["originalRole"], "");
        assert_eq!(detail["role"], "primary");
        assert_eq!(harness.events.with_reason(CHECK_ROLE).len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_role_emits_nothing() {
        let harness = harness();
        harness.engine.set_role("primary");
        let op = check_role(&harness).await;
        let _ = op.run(OpsRequest::default()).await;

        let response = op.run(OpsRequest::default()).await.unwrap().unwrap();

        assert_eq!(response.event(), Some(OpsEvent::Success));
        assert_eq!(response.data["role"], "primary");
        assert_eq!(harness.events.events().len(), 1);
    }

    #[tokio::test]
    async fn test_role_change_after_steady_state() {
        let harness = harness();
        harness.engine.set_role("primary");
        let op = check_role(&harness).await;
        let _ = op.run(OpsRequest::default()).await;

        harness.engine.set_role("secondary");
        assert_matches!(op.run(OpsRequest::default()).await, Err(Error::Probe(_)));

        let events = harness.events.with_reason(CHECK_ROLE);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message_json().unwrap()["originalRole"], "primary");
    }

    #[tokio::test]
    async fn test_pushed_role_skips_engine_read() {
        let harness = harness();
        let op = check_role(&harness).await;

        let request = OpsRequest::with_parameters([("role", "leader")]);
        assert_matches!(op.run(request).await, Err(Error::Probe(_)));

        assert_eq!(harness.engine.calls("get_replica_role"), 0);
    }

    #[tokio::test]
    async fn test_failed_reads_are_debounced() {
        let mut harness = harness();
        harness.settings.probe = ProbeSettings {
            failed_event_report_frequency: 300,
            ..ProbeSettings::default()
        };
        harness
            .engine
            .fail("get_replica_role", EngineError::Failed("connection refused".to_string()));
        let op = check_role(&harness).await;

        for _ in 0..601 {
            let response = op.run(OpsRequest::default()).await.unwrap().unwrap();
            assert_eq!(response.event(), Some(OpsEvent::Failed));
        }
        assert_eq!(harness.events.with_reason(CHECK_ROLE).len(), 3);

        // One success resets the streak, so the next failure reports again.
        harness.engine.clear_failure("get_replica_role");
        let _ = op.run(OpsRequest::default()).await;
        assert_eq!(op.failures.count(), 0);

        harness
            .engine
            .fail("get_replica_role", EngineError::Failed("connection refused".to_string()));
        let _ = op.run(OpsRequest::default()).await;
        assert_eq!(
            harness
                .events
                .with_reason(CHECK_ROLE)
                .iter()
                .filter(|e| e.event_type == keeper_events::EventType::Warning)
                .count(),
            4
        );
    }

    #[tokio::test]
    async fn test_invalid_role_is_reported_as_failed() {
        let mut harness = harness();
        harness.settings.probe.valid_roles = vec!["primary".to_string(), "secondary".to_string()];
        harness.engine.set_role("candidate");
        let op = check_role(&harness).await;

        let response = op.run(OpsRequest::default()).await.unwrap().unwrap();

        assert_eq!(response.event(), Some(OpsEvent::Failed));
        assert!(harness.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_eighty_percent_of_probe() {
        let harness = harness();
        let op = check_role(&harness).await;

        assert_eq!(op.timeout(), std::time::Duration::from_millis(1600));
    }
}
