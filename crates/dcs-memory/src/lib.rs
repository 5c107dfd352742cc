//! In-memory (single process) cluster-state store for local runs and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use keeper_dcs::{Cluster, Dcs, Error, HaConfig, Result, Switchover};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Calls {
    get_cluster: AtomicUsize,
    update_ha_config: AtomicUsize,
    create_switchover: AtomicUsize,
}

/// In-memory cluster-state store.
///
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct MemoryDcs {
    cluster: Arc<RwLock<Cluster>>,
    cache: Arc<RwLock<Option<Cluster>>>,
    switchovers: Arc<RwLock<Vec<Switchover>>>,
    calls: Arc<Calls>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryDcs {
    /// Creates a store publishing `cluster`.
    #[must_use]
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster: Arc::new(RwLock::new(cluster)),
            ..Self::default()
        }
    }

    /// Replaces the published cluster view.
    pub async fn set_cluster(&self, cluster: Cluster) {
        *self.cluster.write().await = cluster;
    }

    /// Current published cluster view.
    pub async fn cluster(&self) -> Cluster {
        self.cluster.read().await.clone()
    }

    /// Makes every call fail with a backend error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every switchover intent recorded, in order.
    pub async fn switchover_history(&self) -> Vec<Switchover> {
        self.switchovers.read().await.clone()
    }

    /// Number of `get_cluster` calls served.
    #[must_use]
    pub fn get_cluster_calls(&self) -> usize {
        self.calls.get_cluster.load(Ordering::SeqCst)
    }

    /// Number of `update_ha_config` calls served.
    #[must_use]
    pub fn update_ha_config_calls(&self) -> usize {
        self.calls.update_ha_config.load(Ordering::SeqCst)
    }

    /// Number of `create_switchover` calls received.
    #[must_use]
    pub fn create_switchover_calls(&self) -> usize {
        self.calls.create_switchover.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Backend("memory dcs marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Dcs for MemoryDcs {
    async fn get_cluster(&self) -> Result<Cluster> {
        self.calls.get_cluster.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let cluster = self.cluster.read().await.clone();
        self.cache.write().await.replace(cluster.clone());

        Ok(cluster)
    }

    async fn get_cluster_from_cache(&self) -> Result<Cluster> {
        if let Some(cluster) = self.cache.read().await.clone() {
            return Ok(cluster);
        }

        self.get_cluster().await
    }

    async fn update_ha_config(&self, ha_config: &HaConfig) -> Result<()> {
        self.calls.update_ha_config.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        debug!("updating ha config: {:?}", ha_config);
        self.cluster.write().await.ha_config = ha_config.clone();

        Ok(())
    }

    async fn create_switchover(&self, leader: &str, candidate: &str) -> Result<()> {
        self.calls.create_switchover.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut cluster = self.cluster.write().await;
        if cluster.switchover.is_some() {
            return Err(Error::SwitchoverPending(cluster.name.clone()));
        }

        let switchover = Switchover {
            leader: leader.to_string(),
            candidate: candidate.to_string(),
            scheduled_at: None,
        };
        debug!("recording switchover: {:?}", switchover);

        cluster.switchover = Some(switchover.clone());
        self.switchovers.write().await.push(switchover);

        Ok(())
    }

    async fn get_switchover(&self) -> Result<Option<Switchover>> {
        self.check_available()?;

        Ok(self.cluster.read().await.switchover.clone())
    }

    async fn delete_switchover(&self) -> Result<()> {
        self.check_available()?;

        self.cluster.write().await.switchover = None;

        Ok(())
    }
}
