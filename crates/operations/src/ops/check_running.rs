use std::time::Duration;

use async_trait::async_trait;
use keeper_events::EventType;
use tokio::net::TcpStream;
use tracing::{info, warn};

use super::CHECK_RUNNING;
use crate::error::Result;
use crate::operation::{InitContext, Operation, OperationBase};
use crate::reporter::FailureReporter;
use crate::request::{OpsEvent, OpsRequest, OpsResponse};

const DIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Checks that the database accepts TCP connections.
///
/// An unreachable database is reported as a `Failed` response and, rate
/// limited, as a warning event.
pub struct CheckRunning {
    base: OperationBase,
    host: String,
    port: u16,
    address: String,
    failures: FailureReporter,
}

impl CheckRunning {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(CHECK_RUNNING),
            host: String::new(),
            port: 0,
            address: String::new(),
            failures: FailureReporter::new(1),
        }
    }

    async fn dial(&self) -> std::io::Result<()> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(DIAL_TIMEOUT, connect).await {
            Ok(stream) => stream.map(drop),
            Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
        }
    }
}

impl Default for CheckRunning {
    fn default() -> Self {
        Self::new()
    }
}

/// `host:port`, with IPv6 literals bracketed.
fn display_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[async_trait]
impl Operation for CheckRunning {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind(ctx);
        let probe = &ctx.settings.probe;
        self.host = probe.db_address.clone();
        self.port = probe.db_port;
        self.address = display_address(&self.host, self.port);
        self.failures = FailureReporter::new(probe.report_frequency());
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        true
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        if let Err(e) = self.dial().await {
            warn!("running check {} error: {}", self.address, e);

            let response = OpsResponse::new(OpsEvent::Failed)
                .with("operation", CHECK_RUNNING)
                .with("message", format!("running check {} error", self.address));

            if self.failures.record_failure() {
                info!(
                    "running checks failed continuously, times: {}",
                    self.failures.count()
                );
                self.base
                    .events()?
                    .emit_or_log(CHECK_RUNNING, EventType::Warning, &response.data)
                    .await;
            }

            return Ok(Some(response));
        }

        self.failures.reset();
        Ok(Some(
            OpsResponse::new(OpsEvent::Success)
                .with("operation", CHECK_RUNNING)
                .with("message", "TCP Connection Established Successfully!"),
        ))
    }
}
