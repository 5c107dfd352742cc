use std::sync::Arc;

use keeper_dcs::{Cluster, Leader, Member};
use keeper_dcs_memory::MemoryDcs;
use keeper_engine::EngineResolver;
use keeper_engine_mock::MockEngineManager;
use keeper_events::MemoryEventSink;

use crate::operation::InitContext;
use crate::settings::Settings;

pub fn cluster(members: &[&str], leader: &str) -> Cluster {
    Cluster {
        name: "pg".to_string(),
        replicas: u32::try_from(members.len()).unwrap(),
        members: members
            .iter()
            .map(|name| Member {
                name: (*name).to_string(),
                ..Member::default()
            })
            .collect(),
        leader: Some(Leader {
            name: leader.to_string(),
            ..Leader::default()
        }),
        ..Cluster::default()
    }
}

pub struct Harness {
    pub dcs: MemoryDcs,
    pub engine: MockEngineManager,
    pub events: MemoryEventSink,
    pub settings: Settings,
}

impl Harness {
    pub fn new(member: &str, cluster: Cluster) -> Self {
        Self {
            dcs: MemoryDcs::new(cluster),
            engine: MockEngineManager::new(member),
            events: MemoryEventSink::new(),
            settings: Settings {
                pod_name: member.to_string(),
                namespace: "default".to_string(),
                ..Settings::default()
            },
        }
    }

    pub fn ctx(&self) -> InitContext {
        InitContext {
            dcs: Arc::new(self.dcs.clone()),
            events: Arc::new(self.events.clone()),
            engines: EngineResolver::new().with_builtin(Arc::new(self.engine.clone())),
            settings: self.settings.clone(),
            volume_stats: None,
        }
    }
}
