//! Failure reports emitted by nodes.

use serde::{Deserialize, Serialize};

/// A failure report as nodes write it under `failed_events/`. The node
/// side defines the format; unknown fields are ignored and absent ones
/// default, so partially filled reports still flow through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailedEvent {
    pub event_type: String,
    pub original_key: String,
    pub node_id: String,
    pub user_id: String,
    pub error_reason_code: i64,
    pub error_reason_name: String,
    pub error_detail: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original_value: String,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_node_report() {
        let raw = br#"{
            "event_type": "pppoe_dial",
            "node_id": "n1",
            "user_id": "1",
            "error_reason_code": 101,
            "error_reason_name": "AUTH_FAILED",
            "error_detail": "CHAP rejected",
            "timestamp": 1700000000
        }"#;
        let event: FailedEvent = serde_json::from_slice(raw).unwrap();
        assert_eq!(event.event_type, "pppoe_dial");
        assert_eq!(event.node_id, "n1");
        assert_eq!(event.error_reason_code, 101);
        assert!(event.original_value.is_empty());
    }

    #[test]
    fn partial_reports_default_missing_fields() {
        let event: FailedEvent = serde_json::from_str(r#"{"node_id":"n1"}"#).unwrap();
        assert_eq!(event.node_id, "n1");
        assert_eq!(event.timestamp, 0);
    }

    #[test]
    fn empty_original_value_is_not_serialized() {
        let event = FailedEvent {
            node_id: "n1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("original_value"));
    }
}
