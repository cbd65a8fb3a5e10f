//! Subscriber (HSI) configuration plane: versioned per-subscriber records,
//! the per-node subscriber-count cap and the PPPoE command publisher.

pub mod commands;
pub mod service;
pub mod subscriber_count;
pub mod types;
pub mod validate;

pub use commands::CommandPublisher;
pub use service::HsiService;
pub use subscriber_count::SubscriberCounts;
pub use types::{CommandEnvelope, HsiConfig, HsiMetadata, HsiRecord, SubscriberCountRecord};

use std::sync::Arc;

use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum HsiError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("User ID must be between 1 and 2000")]
    UserIdOutOfRange,

    #[error("VLAN ID must be between 2 and 4000")]
    VlanIdOutOfRange,

    #[error("Invalid DHCP address pool: {0}")]
    InvalidPool(String),

    #[error("Invalid DHCP subnet: {0}")]
    InvalidSubnet(String),

    #[error("Invalid DHCP gateway: {0}")]
    InvalidGateway(String),

    #[error("DHCP gateway is not on the pool subnet")]
    GatewayOffSubnet,

    #[error("DHCP gateway must be outside the address pool")]
    GatewayInsidePool,

    #[error("User ID exceeds subscriber count")]
    UserIdExceedsCount,

    #[error("Input VLAN has been already used by other user: {user_id}")]
    VlanInUse { user_id: String },

    #[error("User ID mismatch")]
    UserIdMismatch,

    #[error("HSI config not found")]
    NotFound,

    #[error("Subscriber count not found")]
    CountNotFound,

    #[error("Failed to parse subscriber count")]
    CountUnreadable,

    #[error("Subscriber count must be non-negative")]
    NegativeCount,

    #[error("invalid stored record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Next resourceVersion for the document at `key`: "1" for new keys,
/// current+1 when the stored version parses as a decimal integer, "2" for
/// legacy or unparseable metadata.
pub(crate) async fn next_resource_version(
    store: &Arc<dyn Store>,
    key: &str,
) -> Result<String, HsiError> {
    let Some(raw) = store.get(key).await? else {
        return Ok("1".to_string());
    };

    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&raw) else {
        return Ok("2".to_string());
    };

    let current = value
        .get("metadata")
        .and_then(|m| m.get("resourceVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    match current.trim().parse::<i64>() {
        Ok(n) => Ok((n + 1).to_string()),
        Err(_) => Ok("2".to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn test_store() -> Arc<dyn Store> {
        Arc::new(MemStore::new())
    }

    #[tokio::test]
    async fn first_version_is_one() {
        let store = test_store();
        assert_eq!(next_resource_version(&store, "k").await.unwrap(), "1");
    }

    #[tokio::test]
    async fn version_increments() {
        let store = test_store();
        store
            .put(
                "k",
                br#"{"metadata":{"resourceVersion":"41"}}"#.to_vec(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(next_resource_version(&store, "k").await.unwrap(), "42");
    }

    #[tokio::test]
    async fn legacy_records_bump_to_two() {
        let store = test_store();

        store.put("k", b"not json".to_vec(), None).await.unwrap();
        assert_eq!(next_resource_version(&store, "k").await.unwrap(), "2");

        store
            .put("k", br#"{"config":{}}"#.to_vec(), None)
            .await
            .unwrap();
        assert_eq!(next_resource_version(&store, "k").await.unwrap(), "2");

        store
            .put(
                "k",
                br#"{"metadata":{"resourceVersion":"latest"}}"#.to_vec(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(next_resource_version(&store, "k").await.unwrap(), "2");
    }
}
