//! Runs registered operations on fixed intervals.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keeper_bootable::{Bootable, BootableError};
use keeper_operations::{Operation, OpsRequest, Registry};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Schedule of one job.
///
/// The thresholds are carried for callers that want to act on streaks; the
/// scheduler itself only logs outcomes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct JobSettings {
    /// Seconds between runs.
    pub period_seconds: u64,

    /// Seconds a run may take. Also becomes the operation's timeout.
    pub timeout_seconds: u64,

    /// Consecutive successes that count as recovered.
    pub success_threshold: u32,

    /// Consecutive failures that count as failed.
    pub failure_threshold: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            period_seconds: 60,
            timeout_seconds: 60,
            success_threshold: 1,
            failure_threshold: 3,
        }
    }
}

impl JobSettings {
    /// Interval between runs.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }

    /// Time a run may take.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug)]
struct Job {
    name: String,
    operation: Arc<dyn Operation>,
    settings: JobSettings,
}

/// Runs each configured job in its own task.
#[derive(Debug)]
pub struct Scheduler {
    jobs: Vec<Job>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Scheduler {
    /// Binds each `(operation, settings)` pair to its registered operation.
    ///
    /// # Errors
    ///
    /// Fails if a job names an unknown operation or has a zero interval.
    pub fn new(registry: &Registry, jobs: &BTreeMap<String, JobSettings>) -> Result<Self, Error> {
        let jobs = jobs
            .iter()
            .map(|(name, settings)| {
                if settings.period_seconds == 0 || settings.timeout_seconds == 0 {
                    return Err(Error::ZeroInterval(name.clone()));
                }
                let operation = registry
                    .get(name)
                    .ok_or_else(|| Error::UnknownOperation(name.clone()))?;
                Ok(Job {
                    name: name.clone(),
                    operation,
                    settings: settings.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            jobs,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        })
    }

    /// Names of the scheduled operations.
    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.name.as_str())
    }
}

async fn run_job(name: String, operation: Arc<dyn Operation>, settings: JobSettings, token: CancellationToken) {
    let timeout = settings.timeout();
    let mut interval = tokio::time::interval(settings.period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = token.cancelled() => break,
        }

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, operation.run(OpsRequest::default())) => result,
            () = token.cancelled() => break,
        };

        match result {
            Ok(Ok(_)) => debug!(job = %name, "job succeeded"),
            Ok(Err(e)) => warn!(job = %name, "job failed: {}", e),
            Err(_) => warn!(job = %name, "job timed out after {:?}", timeout),
        }
    }
}

#[async_trait]
impl Bootable for Scheduler {
    fn name(&self) -> &str {
        "scheduler"
    }

    async fn start(&self) -> Result<(), BootableError> {
        if self.task_tracker.is_closed() {
            return Err("scheduler already started".into());
        }

        for job in &self.jobs {
            info!(
                job = %job.name,
                period = ?job.settings.period(),
                timeout = ?job.settings.timeout(),
                "scheduling job"
            );
            job.operation.set_timeout(job.settings.timeout());
            self.task_tracker.spawn(run_job(
                job.name.clone(),
                job.operation.clone(),
                job.settings.clone(),
                self.shutdown_token.clone(),
            ));
        }

        self.task_tracker.close();

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BootableError> {
        info!("scheduler shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("scheduler shutdown");

        Ok(())
    }

    async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}
