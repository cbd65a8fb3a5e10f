//! Wire and storage types for the HSI configuration plane.

use serde::{Deserialize, Serialize};

/// PPPoE credentials and DHCP server parameters for one subscriber.
///
/// Ids travel as strings on the wire; non-numeric user ids are legal
/// legacy identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsiConfig {
    pub user_id: String,
    pub vlan_id: String,
    pub account_name: String,
    pub password: String,
    /// Address pool formatted as "start-end".
    pub dhcp_addr_pool: String,
    pub dhcp_subnet: String,
    pub dhcp_gateway: String,
}

/// Audit metadata stored beside each HSI document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HsiMetadata {
    pub node: String,
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
    #[serde(rename = "updatedBy")]
    pub updated_by: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "enableStatus")]
    pub enable_status: String,
}

/// Full document stored at `configs/{nodeId}/hsi/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsiRecord {
    pub config: HsiConfig,
    pub metadata: HsiMetadata,
}

/// Metadata stamped on subscriber-count documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriberCountMetadata {
    pub node: String,
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "updatedBy")]
    pub updated_by: String,
}

/// Document stored at `user_counts/{nodeId}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberCountRecord {
    pub metadata: SubscriberCountMetadata,
    /// Stored as a string; consumers parse it defensively.
    pub subscriber_count: String,
}

/// Imperative command placed at `commands/{nodeId}/pppoe_{action}_{userId}`
/// for the node to consume asynchronously. Latest writer wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub action: String,
    pub user_id: String,
    pub vlan: String,
    pub account: String,
    pub password: String,
    pub timestamp: i64,
}
