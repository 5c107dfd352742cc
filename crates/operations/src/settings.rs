use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Lower bound of the failure-report frequency, in probe cycles.
pub const MIN_REPORT_FREQUENCY: u64 = 300;

/// Upper bound of the failure-report frequency, in probe cycles.
pub const MAX_REPORT_FREQUENCY: u64 = 3600;

/// Static settings shared by every operation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pod the agent runs in.
    pub pod_name: String,

    /// Namespace of the pod.
    pub namespace: String,

    /// IP of the node hosting the pod.
    pub host_ip: String,

    /// Probe settings.
    pub probe: ProbeSettings,

    /// Volume protection settings.
    pub volume_protection: VolumeProtectionSettings,

    /// Node stats endpoint settings.
    pub kubelet: KubeletSettings,
}

/// Role, health and running probe settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Report a failure event every this many consecutive failures.
    pub failed_event_report_frequency: u64,

    /// Timeout of the probe that triggers a role check, in seconds.
    pub role_probe_timeout_seconds: u64,

    /// Roles the database may report. Empty accepts any role.
    pub valid_roles: Vec<String>,

    /// Address of the local database.
    pub db_address: String,

    /// Port of the local database.
    pub db_port: u16,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            failed_event_report_frequency: 1800,
            role_probe_timeout_seconds: 2,
            valid_roles: Vec::new(),
            db_address: "127.0.0.1".to_string(),
            db_port: 3306,
        }
    }
}

impl ProbeSettings {
    /// Report frequency clamped to [`MIN_REPORT_FREQUENCY`, `MAX_REPORT_FREQUENCY`].
    #[must_use]
    pub fn report_frequency(&self) -> u64 {
        self.failed_event_report_frequency
            .clamp(MIN_REPORT_FREQUENCY, MAX_REPORT_FREQUENCY)
    }

    /// Time given to one role read: 80% of the probe timeout.
    #[must_use]
    pub fn role_check_timeout(&self) -> Duration {
        Duration::from_secs(self.role_probe_timeout_seconds) * 4 / 5
    }
}

/// One watched volume.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VolumeSpec {
    /// Volume name in the pod spec.
    pub name: String,

    /// Watermark percentage overriding the global one.
    #[serde(default)]
    pub high_watermark: Option<i64>,
}

/// Volume watermark protection settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VolumeProtectionSettings {
    /// Watermark percentage applied to volumes without their own.
    pub high_watermark: i64,

    /// Watched volumes.
    pub volumes: Vec<VolumeSpec>,
}

/// Node stats endpoint settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct KubeletSettings {
    /// HTTPS port of the stats endpoint.
    pub port: u16,

    /// CA bundle trusted for the endpoint.
    pub ca_file: PathBuf,

    /// Bearer token identifying the agent.
    pub token_file: PathBuf,
}

impl Default for KubeletSettings {
    fn default() -> Self {
        Self {
            port: 10250,
            ca_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt"),
            token_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
        }
    }
}
