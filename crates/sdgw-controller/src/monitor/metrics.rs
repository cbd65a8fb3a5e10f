//! Prometheus gauge families for scraped node telemetry.
//!
//! All families are registered once at startup on an explicitly
//! constructed [`Registry`] shared with the exposition endpoint. Monitors
//! record every label combination they write in a [`SeenSeries`] so that
//! [`NodeMetrics::remove_node`] can drop each series when a node goes
//! away.

use std::collections::HashSet;

use prometheus::{GaugeVec, Opts, Registry};

/// Label combinations a single node's monitor has written.
#[derive(Debug, Default)]
pub struct SeenSeries {
    /// NIC indices seen in system-info scrapes.
    pub nics: HashSet<String>,
    /// (nic_index, user_id) pairs seen in per-user NIC counters.
    pub nic_users: HashSet<(String, String)>,
    /// User ids seen in PPPoE-session and DHCP scrapes.
    pub users: HashSet<String>,
}

pub struct NodeMetrics {
    // Per-NIC counters, labelled {node_uuid, nic_index}.
    pub rx_packets: GaugeVec,
    pub tx_packets: GaugeVec,
    pub rx_bytes: GaugeVec,
    pub tx_bytes: GaugeVec,
    pub rx_errors: GaugeVec,
    pub tx_errors: GaugeVec,
    pub rx_dropped: GaugeVec,

    // Per-user NIC counters, labelled {node_uuid, nic_index, user_id}.
    pub per_user_rx_packets: GaugeVec,
    pub per_user_rx_bytes: GaugeVec,
    pub per_user_tx_packets: GaugeVec,
    pub per_user_tx_bytes: GaugeVec,
    pub per_user_drop_packets: GaugeVec,
    pub per_user_drop_bytes: GaugeVec,

    // Unknown-user aggregate per NIC, labelled {node_uuid, nic_index}.
    pub unknown_user_rx_packets: GaugeVec,
    pub unknown_user_rx_bytes: GaugeVec,
    pub unknown_user_tx_packets: GaugeVec,
    pub unknown_user_tx_bytes: GaugeVec,
    pub unknown_user_drop_packets: GaugeVec,
    pub unknown_user_drop_bytes: GaugeVec,

    // PPPoE session totals per state, labelled {node_uuid}.
    pub total_pppoe_data_sessions: GaugeVec,
    pub total_pppoe_ipcp_sessions: GaugeVec,
    pub total_pppoe_auth_sessions: GaugeVec,
    pub total_pppoe_lcp_sessions: GaugeVec,
    pub total_pppoe_init_sessions: GaugeVec,
    pub total_pppoe_terminated_sessions: GaugeVec,
    pub total_pppoe_not_configured_sessions: GaugeVec,
    pub total_pppoe_error_sessions: GaugeVec,

    // Per-session PPPoE counters, labelled {node_uuid, user_id}.
    pub per_session_rx_packets: GaugeVec,
    pub per_session_rx_bytes: GaugeVec,
    pub per_session_tx_packets: GaugeVec,
    pub per_session_tx_bytes: GaugeVec,

    // DHCP lease gauges, labelled {node_uuid, user_id}.
    pub per_user_dhcp_cur_lease_count: GaugeVec,
    pub per_user_dhcp_max_lease_count: GaugeVec,

    // DHCP server totals, labelled {node_uuid}.
    pub total_running_dhcp_server: GaugeVec,
    pub total_stopped_dhcp_server: GaugeVec,
    pub total_not_configured_dhcp_server: GaugeVec,
}

fn gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl NodeMetrics {
    /// Create and register every gauge family.
    #[allow(clippy::too_many_lines)]
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let nic = &["node_uuid", "nic_index"];
        let nic_user = &["node_uuid", "nic_index", "user_id"];
        let node = &["node_uuid"];
        let user = &["node_uuid", "user_id"];

        Ok(Self {
            rx_packets: gauge(
                registry,
                "sdgw_node_rx_packets_total",
                "Total number of received packets",
                nic,
            )?,
            tx_packets: gauge(
                registry,
                "sdgw_node_tx_packets_total",
                "Total number of transmitted packets",
                nic,
            )?,
            rx_bytes: gauge(
                registry,
                "sdgw_node_rx_bytes_total",
                "Total number of received bytes",
                nic,
            )?,
            tx_bytes: gauge(
                registry,
                "sdgw_node_tx_bytes_total",
                "Total number of transmitted bytes",
                nic,
            )?,
            rx_errors: gauge(
                registry,
                "sdgw_node_rx_errors_total",
                "Total number of receive errors",
                nic,
            )?,
            tx_errors: gauge(
                registry,
                "sdgw_node_tx_errors_total",
                "Total number of transmit errors",
                nic,
            )?,
            rx_dropped: gauge(
                registry,
                "sdgw_node_rx_dropped_total",
                "Total number of dropped received packets",
                nic,
            )?,
            per_user_rx_packets: gauge(
                registry,
                "sdgw_node_per_user_rx_packets_total",
                "Total number of received packets per user",
                nic_user,
            )?,
            per_user_rx_bytes: gauge(
                registry,
                "sdgw_node_per_user_rx_bytes_total",
                "Total number of received bytes per user",
                nic_user,
            )?,
            per_user_tx_packets: gauge(
                registry,
                "sdgw_node_per_user_tx_packets_total",
                "Total number of transmitted packets per user",
                nic_user,
            )?,
            per_user_tx_bytes: gauge(
                registry,
                "sdgw_node_per_user_tx_bytes_total",
                "Total number of transmitted bytes per user",
                nic_user,
            )?,
            per_user_drop_packets: gauge(
                registry,
                "sdgw_node_per_user_dropped_packets_total",
                "Total number of dropped packets per user",
                nic_user,
            )?,
            per_user_drop_bytes: gauge(
                registry,
                "sdgw_node_per_user_dropped_bytes_total",
                "Total number of dropped bytes per user",
                nic_user,
            )?,
            unknown_user_rx_packets: gauge(
                registry,
                "sdgw_node_unknown_user_rx_packets_total",
                "Total number of received packets for unknown user",
                nic,
            )?,
            unknown_user_rx_bytes: gauge(
                registry,
                "sdgw_node_unknown_user_rx_bytes_total",
                "Total number of received bytes for unknown user",
                nic,
            )?,
            unknown_user_tx_packets: gauge(
                registry,
                "sdgw_node_unknown_user_tx_packets_total",
                "Total number of transmitted packets for unknown user",
                nic,
            )?,
            unknown_user_tx_bytes: gauge(
                registry,
                "sdgw_node_unknown_user_tx_bytes_total",
                "Total number of transmitted bytes for unknown user",
                nic,
            )?,
            unknown_user_drop_packets: gauge(
                registry,
                "sdgw_node_unknown_user_dropped_packets_total",
                "Total number of dropped packets for unknown user",
                nic,
            )?,
            unknown_user_drop_bytes: gauge(
                registry,
                "sdgw_node_unknown_user_dropped_bytes_total",
                "Total number of dropped bytes for unknown user",
                nic,
            )?,
            total_pppoe_data_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_data_sessions",
                "Total number of PPPoE data sessions",
                node,
            )?,
            total_pppoe_ipcp_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_ipcp_sessions",
                "Total number of PPPoE IPCP sessions",
                node,
            )?,
            total_pppoe_auth_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_auth_sessions",
                "Total number of PPPoE auth sessions",
                node,
            )?,
            total_pppoe_lcp_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_lcp_sessions",
                "Total number of PPPoE LCP sessions",
                node,
            )?,
            total_pppoe_init_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_init_sessions",
                "Total number of PPPoE init sessions",
                node,
            )?,
            total_pppoe_terminated_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_terminated_sessions",
                "Total number of PPPoE terminated sessions",
                node,
            )?,
            total_pppoe_not_configured_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_not_configured_sessions",
                "Total number of PPPoE not configured sessions",
                node,
            )?,
            total_pppoe_error_sessions: gauge(
                registry,
                "sdgw_node_total_pppoe_error_sessions",
                "Total number of PPPoE sessions in unknown error state",
                node,
            )?,
            per_session_rx_packets: gauge(
                registry,
                "sdgw_node_per_pppoe_session_rx_packets_total",
                "Total number of received packets per PPPoE session",
                user,
            )?,
            per_session_rx_bytes: gauge(
                registry,
                "sdgw_node_per_pppoe_session_rx_bytes_total",
                "Total number of received bytes per PPPoE session",
                user,
            )?,
            per_session_tx_packets: gauge(
                registry,
                "sdgw_node_per_pppoe_session_tx_packets_total",
                "Total number of transmitted packets per PPPoE session",
                user,
            )?,
            per_session_tx_bytes: gauge(
                registry,
                "sdgw_node_per_pppoe_session_tx_bytes_total",
                "Total number of transmitted bytes per PPPoE session",
                user,
            )?,
            per_user_dhcp_cur_lease_count: gauge(
                registry,
                "sdgw_node_per_user_dhcp_cur_lease_count",
                "Current number of DHCP leases per user",
                user,
            )?,
            per_user_dhcp_max_lease_count: gauge(
                registry,
                "sdgw_node_per_user_dhcp_max_lease_count",
                "Maximum capacity of DHCP leases per user",
                user,
            )?,
            total_running_dhcp_server: gauge(
                registry,
                "sdgw_node_total_running_dhcp_server",
                "Total number of running DHCP servers",
                node,
            )?,
            total_stopped_dhcp_server: gauge(
                registry,
                "sdgw_node_total_stopped_dhcp_server",
                "Total number of stopped DHCP servers",
                node,
            )?,
            total_not_configured_dhcp_server: gauge(
                registry,
                "sdgw_node_total_not_configured_dhcp_server",
                "Total number of not configured DHCP servers",
                node,
            )?,
        })
    }

    fn nic_families(&self) -> [&GaugeVec; 13] {
        [
            &self.rx_packets,
            &self.tx_packets,
            &self.rx_bytes,
            &self.tx_bytes,
            &self.rx_errors,
            &self.tx_errors,
            &self.rx_dropped,
            &self.unknown_user_rx_packets,
            &self.unknown_user_rx_bytes,
            &self.unknown_user_tx_packets,
            &self.unknown_user_tx_bytes,
            &self.unknown_user_drop_packets,
            &self.unknown_user_drop_bytes,
        ]
    }

    fn nic_user_families(&self) -> [&GaugeVec; 6] {
        [
            &self.per_user_rx_packets,
            &self.per_user_rx_bytes,
            &self.per_user_tx_packets,
            &self.per_user_tx_bytes,
            &self.per_user_drop_packets,
            &self.per_user_drop_bytes,
        ]
    }

    fn user_families(&self) -> [&GaugeVec; 6] {
        [
            &self.per_session_rx_packets,
            &self.per_session_rx_bytes,
            &self.per_session_tx_packets,
            &self.per_session_tx_bytes,
            &self.per_user_dhcp_cur_lease_count,
            &self.per_user_dhcp_max_lease_count,
        ]
    }

    fn node_families(&self) -> [&GaugeVec; 11] {
        [
            &self.total_pppoe_data_sessions,
            &self.total_pppoe_ipcp_sessions,
            &self.total_pppoe_auth_sessions,
            &self.total_pppoe_lcp_sessions,
            &self.total_pppoe_init_sessions,
            &self.total_pppoe_terminated_sessions,
            &self.total_pppoe_not_configured_sessions,
            &self.total_pppoe_error_sessions,
            &self.total_running_dhcp_server,
            &self.total_stopped_dhcp_server,
            &self.total_not_configured_dhcp_server,
        ]
    }

    /// Remove every series carrying `node_uuid` that `seen` recorded.
    /// Missing series are ignored.
    pub fn remove_node(&self, node_uuid: &str, seen: &SeenSeries) {
        for nic in &seen.nics {
            for family in self.nic_families() {
                let _ = family.remove_label_values(&[node_uuid, nic]);
            }
        }
        for (nic, user_id) in &seen.nic_users {
            for family in self.nic_user_families() {
                let _ = family.remove_label_values(&[node_uuid, nic, user_id]);
            }
        }
        for user_id in &seen.users {
            for family in self.user_families() {
                let _ = family.remove_label_values(&[node_uuid, user_id]);
            }
        }
        for family in self.node_families() {
            let _ = family.remove_label_values(&[node_uuid]);
        }
    }
}
