//! Interface to the distributed cluster-state store (DCS) and the cluster view it publishes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cluster;
mod error;
mod ha_config;

pub use cluster::{Cluster, Leader, Member, Switchover};
pub use error::Error;
pub use ha_config::{DeletionState, HaConfig};

use async_trait::async_trait;

/// Result type for DCS calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Read and intent calls the agent issues against the cluster-state store.
///
/// The agent never mutates the cluster structure directly; it reads a view
/// and asks the store to record intents.
#[async_trait]
pub trait Dcs
where
    Self: Send + Sync + 'static,
{
    /// Reads a fresh cluster view from the store.
    async fn get_cluster(&self) -> Result<Cluster>;

    /// Returns the last view read by [`Dcs::get_cluster`], reading one if
    /// nothing is cached yet.
    async fn get_cluster_from_cache(&self) -> Result<Cluster>;

    /// Persists the HA configuration (including deletion markers).
    async fn update_ha_config(&self, ha_config: &HaConfig) -> Result<()>;

    /// Records a switchover intent. Either side may be empty, not both.
    async fn create_switchover(&self, leader: &str, candidate: &str) -> Result<()>;

    /// Reads the pending switchover intent, if any.
    async fn get_switchover(&self) -> Result<Option<Switchover>>;

    /// Removes the pending switchover intent.
    async fn delete_switchover(&self) -> Result<()>;
}
