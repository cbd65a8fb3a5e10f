//! Supervisor for per-node monitor tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, RwLock};
use tonic::transport::Endpoint;
use tracing::{error, info};

use super::metrics::{NodeMetrics, SeenSeries};
use super::{scrape, NODE_SCRAPE_PORT};
use crate::registry::MonitorController;

struct MonitorHandle {
    cancel: watch::Sender<bool>,
    seen: Arc<Mutex<SeenSeries>>,
}

/// Owns the outbound channel and scrape task for every monitored node.
/// Start and stop serialize under the map's write lock.
pub struct NodeMonitorManager {
    monitors: RwLock<HashMap<String, MonitorHandle>>,
    metrics: Arc<NodeMetrics>,
}

impl NodeMonitorManager {
    pub fn new(metrics: Arc<NodeMetrics>) -> Self {
        Self {
            monitors: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Begin monitoring a node, replacing any running monitor for the same
    /// uuid. The channel connects lazily, so an unreachable node only
    /// surfaces as failed scrape ticks.
    pub async fn start_monitoring(&self, node_uuid: &str, node_ip: &str) {
        let mut monitors = self.monitors.write().await;

        if monitors.contains_key(node_uuid) {
            info!(node_uuid = %node_uuid, "Already monitoring node, restarting");
            self.stop_entry(&mut monitors, node_uuid);
        }

        let addr = format!("http://{node_ip}:{NODE_SCRAPE_PORT}");
        let endpoint = match Endpoint::from_shared(addr.clone()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(node_uuid = %node_uuid, addr = %addr, error = %e,
                    "Invalid node scrape address");
                return;
            }
        };
        let channel = endpoint.connect_lazy();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(SeenSeries::default()));
        tokio::spawn(scrape::run_monitor(
            node_uuid.to_string(),
            channel,
            Arc::clone(&self.metrics),
            Arc::clone(&seen),
            cancel_rx,
        ));

        monitors.insert(
            node_uuid.to_string(),
            MonitorHandle {
                cancel: cancel_tx,
                seen,
            },
        );

        info!(node_uuid = %node_uuid, addr = %addr, "Started monitoring node");
    }

    /// Stop monitoring a node and drop its metric series.
    pub async fn stop_monitoring(&self, node_uuid: &str) {
        let mut monitors = self.monitors.write().await;
        self.stop_entry(&mut monitors, node_uuid);
    }

    /// Stop every monitor. Called on process shutdown.
    pub async fn stop_all(&self) {
        let mut monitors = self.monitors.write().await;
        let uuids: Vec<String> = monitors.keys().cloned().collect();
        for uuid in uuids {
            self.stop_entry(&mut monitors, &uuid);
        }
    }

    fn stop_entry(&self, monitors: &mut HashMap<String, MonitorHandle>, node_uuid: &str) {
        let Some(handle) = monitors.remove(node_uuid) else {
            info!(node_uuid = %node_uuid, "Node is not being monitored");
            return;
        };

        // The monitor task exits on the next select round; the channel is
        // dropped with it.
        let _ = handle.cancel.send(true);

        let seen = handle.seen.lock().expect("seen lock poisoned");
        self.metrics.remove_node(node_uuid, &seen);

        info!(node_uuid = %node_uuid, "Stopped monitoring node");
    }

    pub async fn is_monitoring(&self, node_uuid: &str) -> bool {
        self.monitors.read().await.contains_key(node_uuid)
    }

    pub async fn monitor_count(&self) -> usize {
        self.monitors.read().await.len()
    }
}

#[tonic::async_trait]
impl MonitorController for NodeMonitorManager {
    async fn start(&self, node_uuid: &str, node_ip: &str) {
        self.start_monitoring(node_uuid, node_ip).await;
    }

    async fn stop(&self, node_uuid: &str) {
        self.stop_monitoring(node_uuid).await;
    }
}
