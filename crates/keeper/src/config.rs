use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use keeper_dcs::{Cluster, Leader, Member};
use keeper_operations::{KubeletSettings, ProbeSettings, Settings, VolumeProtectionSettings};
use keeper_scheduler::JobSettings;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Agent configuration, read from TOML.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pod the agent runs in.
    pub pod_name: String,

    /// Namespace of the pod.
    pub namespace: String,

    /// Address of the node, used to reach the kubelet.
    pub host_ip: String,

    /// Built-in engine manager kind.
    pub engine: Option<String>,

    /// HTTP operation surface.
    pub dispatch: DispatchSettings,

    /// Health-check surface.
    pub health: HealthSettings,

    /// Probe tuning.
    pub probe: ProbeSettings,

    /// Watched volumes.
    pub volume_protection: VolumeProtectionSettings,

    /// Kubelet stats endpoint.
    pub kubelet: KubeletSettings,

    /// Event delivery.
    pub events: EventSettings,

    /// Out-of-process engine manager.
    pub remote_engine: Option<RemoteEngineSettings>,

    /// Literal commands by action.
    pub commands: BTreeMap<String, Vec<String>>,

    /// Periodic jobs by operation.
    pub jobs: BTreeMap<String, JobSettings>,

    /// Initial cluster view of the in-memory store.
    pub cluster: Option<Cluster>,
}

/// HTTP operation surface.
#[derive(Clone, Debug, Deserialize)]
pub struct DispatchSettings {
    /// Socket address to bind.
    pub listen_addr: SocketAddr,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_DISPATCH_PORT)),
        }
    }
}

/// Health-check surface.
#[derive(Clone, Debug, Deserialize)]
pub struct HealthSettings {
    /// Socket address to bind.
    pub listen_addr: SocketAddr,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HEALTH_PORT)),
        }
    }
}

/// Event delivery settings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventSettings {
    /// HTTP endpoint receiving events. Events are logged when unset.
    pub endpoint: Option<String>,
}

/// Remote engine manager settings.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteEngineSettings {
    /// Address of the engine's rpc server.
    pub addr: SocketAddr,

    /// Seconds each call may take.
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

const fn default_remote_timeout() -> u64 {
    10
}

impl RemoteEngineSettings {
    /// Per-call timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Default port of the HTTP operation surface.
pub const DEFAULT_DISPATCH_PORT: u16 = 3501;

/// Default port of the health-check surface.
pub const DEFAULT_HEALTH_PORT: u16 = 50001;

impl Config {
    /// Parses a TOML document.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ReadConfig(path.display().to_string(), e))?;
        Self::parse(&text)
    }

    /// Settings handed to operations.
    pub fn settings(&self) -> Settings {
        Settings {
            pod_name: self.pod_name.clone(),
            namespace: self.namespace.clone(),
            host_ip: self.host_ip.clone(),
            probe: self.probe.clone(),
            volume_protection: self.volume_protection.clone(),
            kubelet: self.kubelet.clone(),
        }
    }

    /// The configured cluster, or a single-member cluster led by this pod.
    pub fn initial_cluster(&self) -> Cluster {
        self.cluster.clone().unwrap_or_else(|| Cluster {
            name: self.pod_name.clone(),
            replicas: 1,
            members: vec![Member {
                name: self.pod_name.clone(),
                ..Member::default()
            }],
            leader: Some(Leader {
                name: self.pod_name.clone(),
                ..Leader::default()
            }),
            ..Cluster::default()
        })
    }
}
