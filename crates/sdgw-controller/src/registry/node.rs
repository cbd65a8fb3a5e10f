//! Stored node record.

use serde::{Deserialize, Serialize};

/// Status stamped on records by registration and heartbeats.
pub const STATUS_ACTIVE: &str = "active";

/// Record stored at `nodes/{uuid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uuid: String,
    pub ip: String,
    pub version: String,
    /// Seconds since epoch at registration.
    pub registered_at: i64,
    /// Seconds since epoch of the last register or heartbeat.
    pub last_seen_at: i64,
    /// Uptime reported by the node's most recent heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<i64>,
    pub status: String,
}
