//! Node lifecycle: registration, heartbeats, unregistration and stale
//! detection.
//!
//! The registry owns the `nodes/` keyspace. It talks to the per-node
//! monitor supervisor only through the [`MonitorController`] seam, so the
//! two sides stay decoupled: register always starts monitoring before
//! returning, and both unregister paths stop monitoring before deleting
//! the record.

pub mod node;
mod sweeper;

pub use node::{NodeRecord, STATUS_ACTIVE};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::{KvPair, KeyOrder, Store, StoreError};
use crate::util::unix_now;

/// Seam between the registry and the per-node monitor supervisor.
#[tonic::async_trait]
pub trait MonitorController: Send + Sync {
    /// Begin scraping a node. Replaces any existing monitor for the uuid.
    async fn start(&self, node_uuid: &str, node_ip: &str);

    /// Stop scraping a node and drop its metric series.
    async fn stop(&self, node_uuid: &str);
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often the stale sweeper wakes.
    pub check_interval: Duration,
    /// Age of `last_seen_at` beyond which a node is stale.
    pub heartbeat_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("node_uuid is required")]
    MissingUuid,

    #[error("node not registered")]
    NotRegistered,

    #[error("invalid node record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct NodeRegistry {
    store: Arc<dyn Store>,
    monitors: Arc<dyn MonitorController>,
    config: RegistryConfig,
}

fn node_key(uuid: &str) -> String {
    format!("nodes/{uuid}")
}

impl NodeRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        monitors: Arc<dyn MonitorController>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            store,
            monitors,
            config,
        }
    }

    /// Register a node, overwriting any previous record, then start
    /// monitoring it.
    pub async fn register(
        &self,
        uuid: &str,
        ip: &str,
        version: &str,
    ) -> Result<(), RegistryError> {
        if uuid.is_empty() {
            return Err(RegistryError::MissingUuid);
        }

        let now = unix_now();
        let record = NodeRecord {
            uuid: uuid.to_string(),
            ip: ip.to_string(),
            version: version.to_string(),
            registered_at: now,
            last_seen_at: now,
            uptime: None,
            status: STATUS_ACTIVE.to_string(),
        };
        self.store
            .put(&node_key(uuid), serde_json::to_vec(&record)?, None)
            .await?;

        info!(node_uuid = %uuid, ip = %ip, version = %version, "Node registered");

        self.monitors.start(uuid, ip).await;
        Ok(())
    }

    /// Remove a registered node: stop monitoring first, then delete the
    /// record. Fails when the node does not exist.
    pub async fn unregister(&self, uuid: &str) -> Result<(), RegistryError> {
        if uuid.is_empty() {
            return Err(RegistryError::MissingUuid);
        }

        if self.store.get(&node_key(uuid)).await?.is_none() {
            return Err(RegistryError::NotRegistered);
        }

        self.monitors.stop(uuid).await;
        self.store.delete(&node_key(uuid)).await?;

        info!(node_uuid = %uuid, "Node unregistered");
        Ok(())
    }

    /// Merge a heartbeat into an existing record. Unknown uuids fail;
    /// nodes are expected to re-register, not to be auto-created here.
    pub async fn heartbeat(&self, uuid: &str, ip: &str, uptime: i64) -> Result<(), RegistryError> {
        if uuid.is_empty() {
            return Err(RegistryError::MissingUuid);
        }

        let key = node_key(uuid);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or(RegistryError::NotRegistered)?;
        let mut record: NodeRecord = serde_json::from_slice(&raw)?;

        record.last_seen_at = unix_now();
        record.uptime = Some(uptime);
        if !ip.is_empty() {
            record.ip = ip.to_string();
        }
        record.status = STATUS_ACTIVE.to_string();

        self.store
            .put(&key, serde_json::to_vec(&record)?, None)
            .await?;

        info!(node_uuid = %uuid, uptime, ip = %ip, "Heartbeat received");
        Ok(())
    }

    /// All stored node records as raw key-value pairs.
    pub async fn list(&self) -> Result<Vec<KvPair>, RegistryError> {
        Ok(self.store.get_prefix("nodes/", KeyOrder::Ascend).await?)
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn monitors(&self) -> &Arc<dyn MonitorController> {
        &self.monitors
    }

    pub(crate) fn config(&self) -> &RegistryConfig {
        &self.config
    }
}
