use serde::{Deserialize, Serialize};

use crate::HaConfig;

/// One database instance as seen by the store.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Member (pod) name. Unique within the cluster.
    pub name: String,

    /// Last role published for the member.
    #[serde(default)]
    pub role: String,

    /// Network address of the member.
    #[serde(default)]
    pub pod_ip: String,

    /// Port the database listens on.
    #[serde(default)]
    pub db_port: u16,

    /// Port this agent listens on for the member.
    #[serde(default)]
    pub agent_port: u16,

    /// Opaque store-specific version of the record.
    #[serde(default)]
    pub index: String,
}

/// Current leader lease.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Leader {
    /// Name of the member holding the lease.
    pub name: String,

    /// Unix seconds the lease was acquired.
    pub acquire_time: i64,

    /// Unix seconds the lease was last renewed.
    pub renew_time: i64,

    /// Lease TTL in seconds.
    pub ttl: u64,
}

/// A pending switchover intent.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Switchover {
    /// Requested current leader. May be empty.
    pub leader: String,

    /// Requested new leader. May be empty.
    pub candidate: String,

    /// Unix seconds the switchover is scheduled at, if deferred.
    #[serde(default)]
    pub scheduled_at: Option<i64>,
}

/// Cluster view published by the store.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    /// Cluster name.
    pub name: String,

    /// Desired number of replicas.
    pub replicas: u32,

    /// Members in store order.
    pub members: Vec<Member>,

    /// Leader lease, if held.
    pub leader: Option<Leader>,

    /// Pending switchover, if any.
    pub switchover: Option<Switchover>,

    /// HA configuration.
    pub ha_config: HaConfig,
}

impl Cluster {
    /// Looks up a member by name.
    #[must_use]
    pub fn get_member_with_name(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// The member currently holding the leader lease.
    #[must_use]
    pub fn get_leader_member(&self) -> Option<&Member> {
        self.leader
            .as_ref()
            .and_then(|leader| self.get_member_with_name(&leader.name))
    }

    /// Whether HA management is enabled.
    #[must_use]
    pub const fn is_ha_enabled(&self) -> bool {
        self.ha_config.enable
    }

    /// Names of every member.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }
}
