//! The per-node scrape loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tonic::transport::Channel;
use tracing::{debug, error, info};

use sdgw_proto::v1::fastrg_service_client::FastrgServiceClient;

use super::metrics::{NodeMetrics, SeenSeries};
use crate::util::parse_ip_range;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(1);
const SCRAPE_DEADLINE: Duration = Duration::from_secs(5);

/// Tick every second until cancelled, scraping the node's three telemetry
/// RPCs. Scrape failures are logged and the tick abandoned; the next tick
/// proceeds without backoff.
pub(super) async fn run_monitor(
    node_uuid: String,
    channel: Channel,
    metrics: Arc<NodeMetrics>,
    seen: Arc<Mutex<SeenSeries>>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut client = FastrgServiceClient::new(channel);
    let mut ticker = tokio::time::interval(SCRAPE_INTERVAL);
    ticker.tick().await; // Skip first immediate tick

    info!(node_uuid = %node_uuid, "Started monitoring loop");

    loop {
        tokio::select! {
            _ = cancel.changed() => {
                info!(node_uuid = %node_uuid, "Stopping monitoring loop");
                return;
            }
            _ = ticker.tick() => {
                collect(&mut client, &node_uuid, &metrics, &seen).await;
            }
        }
    }
}

/// One scrape tick: NIC counters, PPPoE session stats, DHCP lease stats,
/// all under a single deadline.
async fn collect(
    client: &mut FastrgServiceClient<Channel>,
    node_uuid: &str,
    metrics: &NodeMetrics,
    seen: &Mutex<SeenSeries>,
) {
    let scrape = async {
        scrape_nic_counters(client, node_uuid, metrics, seen)
            .await
            .map_err(|e| ("NIC counters", e))?;
        scrape_pppoe_sessions(client, node_uuid, metrics, seen)
            .await
            .map_err(|e| ("PPPoE session stats", e))?;
        scrape_dhcp_leases(client, node_uuid, metrics, seen)
            .await
            .map_err(|e| ("DHCP lease stats", e))?;
        Ok::<(), (&str, tonic::Status)>(())
    };

    match tokio::time::timeout(SCRAPE_DEADLINE, scrape).await {
        Ok(Ok(())) => {}
        Ok(Err((stage, status))) => {
            error!(node_uuid = %node_uuid, stage, error = %status, "Scrape failed");
        }
        Err(_) => {
            error!(node_uuid = %node_uuid, "Scrape deadline exceeded");
        }
    }
}

#[allow(clippy::cast_precision_loss)]
async fn scrape_nic_counters(
    client: &mut FastrgServiceClient<Channel>,
    node_uuid: &str,
    metrics: &NodeMetrics,
    seen: &Mutex<SeenSeries>,
) -> Result<(), tonic::Status> {
    let reply = client.get_system_info(()).await?.into_inner();

    for (i, stat) in reply.stats.iter().enumerate() {
        let nic_index = i.to_string();
        let nic = &[node_uuid, nic_index.as_str()];

        metrics.rx_packets.with_label_values(nic).set(stat.rx_packets as f64);
        metrics.tx_packets.with_label_values(nic).set(stat.tx_packets as f64);
        metrics.rx_bytes.with_label_values(nic).set(stat.rx_bytes as f64);
        metrics.tx_bytes.with_label_values(nic).set(stat.tx_bytes as f64);
        metrics.rx_errors.with_label_values(nic).set(stat.rx_errors as f64);
        metrics.tx_errors.with_label_values(nic).set(stat.tx_errors as f64);
        metrics.rx_dropped.with_label_values(nic).set(stat.rx_dropped as f64);

        // The last per-user slot aggregates traffic from unknown users.
        if let Some((unknown, users)) = stat.per_user_stats.split_last() {
            for user_stat in users {
                let user_id = user_stat.user_id.to_string();
                let labels = &[node_uuid, nic_index.as_str(), user_id.as_str()];
                metrics
                    .per_user_rx_packets
                    .with_label_values(labels)
                    .set(user_stat.rx_packets as f64);
                metrics
                    .per_user_rx_bytes
                    .with_label_values(labels)
                    .set(user_stat.rx_bytes as f64);
                metrics
                    .per_user_tx_packets
                    .with_label_values(labels)
                    .set(user_stat.tx_packets as f64);
                metrics
                    .per_user_tx_bytes
                    .with_label_values(labels)
                    .set(user_stat.tx_bytes as f64);
                metrics
                    .per_user_drop_packets
                    .with_label_values(labels)
                    .set(user_stat.dropped_packets as f64);
                metrics
                    .per_user_drop_bytes
                    .with_label_values(labels)
                    .set(user_stat.dropped_bytes as f64);
                seen.lock()
                    .expect("seen lock poisoned")
                    .nic_users
                    .insert((nic_index.clone(), user_id));
            }

            metrics
                .unknown_user_rx_packets
                .with_label_values(nic)
                .set(unknown.rx_packets as f64);
            metrics
                .unknown_user_rx_bytes
                .with_label_values(nic)
                .set(unknown.rx_bytes as f64);
            metrics
                .unknown_user_tx_packets
                .with_label_values(nic)
                .set(unknown.tx_packets as f64);
            metrics
                .unknown_user_tx_bytes
                .with_label_values(nic)
                .set(unknown.tx_bytes as f64);
            metrics
                .unknown_user_drop_packets
                .with_label_values(nic)
                .set(unknown.dropped_packets as f64);
            metrics
                .unknown_user_drop_bytes
                .with_label_values(nic)
                .set(unknown.dropped_bytes as f64);
        }

        seen.lock().expect("seen lock poisoned").nics.insert(nic_index);
    }

    Ok(())
}

#[derive(Default)]
struct PppoeTotals {
    data: u64,
    ipcp: u64,
    auth: u64,
    lcp: u64,
    init: u64,
    terminated: u64,
    not_configured: u64,
    error: u64,
}

#[allow(clippy::cast_precision_loss)]
async fn scrape_pppoe_sessions(
    client: &mut FastrgServiceClient<Channel>,
    node_uuid: &str,
    metrics: &NodeMetrics,
    seen: &Mutex<SeenSeries>,
) -> Result<(), tonic::Status> {
    let reply = client.get_hsi_info(()).await?.into_inner();

    let mut totals = PppoeTotals::default();
    for session in &reply.hsi_infos {
        match session.status.as_str() {
            "Data phase" => totals.data += 1,
            "IPCP phase" => totals.ipcp += 1,
            "Auth phase" => totals.auth += 1,
            "LCP phase" => totals.lcp += 1,
            "PPPoE Init" => totals.init += 1,
            "End phase" => totals.terminated += 1,
            "Not configured" => totals.not_configured += 1,
            _ => totals.error += 1,
        }

        let user_id = session.user_id.to_string();
        let labels = &[node_uuid, user_id.as_str()];
        metrics
            .per_session_rx_packets
            .with_label_values(labels)
            .set(session.pppoes_rx_packets as f64);
        metrics
            .per_session_rx_bytes
            .with_label_values(labels)
            .set(session.pppoes_rx_bytes as f64);
        metrics
            .per_session_tx_packets
            .with_label_values(labels)
            .set(session.pppoes_tx_packets as f64);
        metrics
            .per_session_tx_bytes
            .with_label_values(labels)
            .set(session.pppoes_tx_bytes as f64);
        seen.lock().expect("seen lock poisoned").users.insert(user_id);
    }

    let node = &[node_uuid];
    metrics
        .total_pppoe_data_sessions
        .with_label_values(node)
        .set(totals.data as f64);
    metrics
        .total_pppoe_ipcp_sessions
        .with_label_values(node)
        .set(totals.ipcp as f64);
    metrics
        .total_pppoe_auth_sessions
        .with_label_values(node)
        .set(totals.auth as f64);
    metrics
        .total_pppoe_lcp_sessions
        .with_label_values(node)
        .set(totals.lcp as f64);
    metrics
        .total_pppoe_init_sessions
        .with_label_values(node)
        .set(totals.init as f64);
    metrics
        .total_pppoe_terminated_sessions
        .with_label_values(node)
        .set(totals.terminated as f64);
    metrics
        .total_pppoe_not_configured_sessions
        .with_label_values(node)
        .set(totals.not_configured as f64);
    metrics
        .total_pppoe_error_sessions
        .with_label_values(node)
        .set(totals.error as f64);

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
async fn scrape_dhcp_leases(
    client: &mut FastrgServiceClient<Channel>,
    node_uuid: &str,
    metrics: &NodeMetrics,
    seen: &Mutex<SeenSeries>,
) -> Result<(), tonic::Status> {
    let reply = client.get_dhcp_info(()).await?.into_inner();

    let mut running: u64 = 0;
    let mut stopped: u64 = 0;
    let mut not_configured: u64 = 0;

    for server in &reply.dhcp_infos {
        let configured = server.status == "DHCP server is on"
            || (server.status == "DHCP server is off" && server.ip_range != "Not configured");
        if !configured {
            not_configured += 1;
            continue;
        }

        let user_id = server.user_id.to_string();
        let labels = &[node_uuid, user_id.as_str()];
        metrics
            .per_user_dhcp_cur_lease_count
            .with_label_values(labels)
            .set(server.inuse_ips.len() as f64);
        seen.lock().expect("seen lock poisoned").users.insert(user_id.clone());

        let (start, end) = match parse_ip_range(&server.ip_range) {
            Ok(range) => range,
            Err(e) => {
                debug!(node_uuid = %node_uuid, ip_range = %server.ip_range, error = %e,
                    "Failed to parse DHCP pool range");
                continue;
            }
        };
        let max_leases = u64::from(u32::from(end).saturating_sub(u32::from(start))) + 1;
        metrics
            .per_user_dhcp_max_lease_count
            .with_label_values(labels)
            .set(max_leases as f64);

        if server.status == "DHCP server is on" {
            running += 1;
        } else {
            stopped += 1;
        }
    }

    let node = &[node_uuid];
    metrics
        .total_running_dhcp_server
        .with_label_values(node)
        .set(running as f64);
    metrics
        .total_stopped_dhcp_server
        .with_label_values(node)
        .set(stopped as f64);
    metrics
        .total_not_configured_dhcp_server
        .with_label_values(node)
        .set(not_configured as f64);

    Ok(())
}
