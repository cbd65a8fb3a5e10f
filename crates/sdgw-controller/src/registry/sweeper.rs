//! Background sweep that removes nodes whose heartbeats stopped.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::{MonitorController as _, NodeRegistry};
use crate::store::{deadline, KeyOrder, Store as _};
use crate::util::unix_now;

const SWEEP_READ_DEADLINE: Duration = Duration::from_secs(10);

impl NodeRegistry {
    /// Spawn the stale-node sweeper. It wakes every `check_interval` and
    /// exits when `shutdown` flips.
    pub fn spawn_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.config().check_interval);
            ticker.tick().await; // Skip first immediate tick

            info!(
                check_interval_secs = registry.config().check_interval.as_secs(),
                heartbeat_timeout_secs = registry.config().heartbeat_timeout.as_secs(),
                "Started stale node sweeper"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => registry.sweep_once().await,
                    _ = shutdown.changed() => {
                        info!("Stopping stale node sweeper");
                        return;
                    }
                }
            }
        })
    }

    /// One sweep cycle: stop monitoring and delete every node whose
    /// `last_seen_at` is older than the heartbeat timeout.
    pub async fn sweep_once(&self) {
        let pairs = match deadline(
            SWEEP_READ_DEADLINE,
            self.store().get_prefix("nodes/", KeyOrder::Ascend),
        )
        .await
        {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(error = %e, "Failed to list nodes for stale sweep");
                return;
            }
        };

        let now = unix_now();
        #[allow(clippy::cast_possible_wrap)]
        let timeout = self.config().heartbeat_timeout.as_secs() as i64;
        let mut stale = 0usize;

        for pair in pairs {
            let value: serde_json::Value = match serde_json::from_slice(&pair.value) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key = %pair.key, error = %e, "Skipping undecodable node record");
                    continue;
                }
            };

            let Some(last_seen) = value.get("last_seen_at").and_then(|v| v.as_i64()) else {
                warn!(key = %pair.key, "Node record has no usable last_seen_at, skipping");
                continue;
            };

            let age = now - last_seen;
            if age <= timeout {
                continue;
            }

            let uuid = value
                .get("uuid")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| pair.key.trim_start_matches("nodes/").to_string());

            info!(node_uuid = %uuid, age_secs = age, "Node is stale, unregistering");
            self.monitors().stop(&uuid).await;
            if let Err(e) = self.store().delete(&pair.key).await {
                warn!(node_uuid = %uuid, error = %e, "Failed to delete stale node");
            } else {
                stale += 1;
            }
        }

        if stale > 0 {
            info!(count = stale, "Removed stale nodes");
        }
    }
}
