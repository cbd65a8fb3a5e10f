//! Per-node subscriber-count cap.
//!
//! The cap bounds acceptable numeric HSI user ids. An absent or
//! unreadable record means no filtering, never a hard failure on the read
//! paths that merely consult it.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use super::types::{SubscriberCountMetadata, SubscriberCountRecord};
use super::{next_resource_version, HsiError};
use crate::store::Store;

#[derive(Clone)]
pub struct SubscriberCounts {
    store: Arc<dyn Store>,
}

fn count_key(node_id: &str) -> String {
    // Stored with a trailing slash; this is a literal key, not a prefix.
    format!("user_counts/{node_id}/")
}

impl SubscriberCounts {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Cap for a node, or `None` when unset or unreadable (logged).
    pub async fn cap(&self, node_id: &str) -> Option<i64> {
        let raw = match self.store.get(&count_key(node_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(node_id = %node_id, error = %e,
                    "Failed to read subscriber count, proceeding without filtering");
                return None;
            }
        };

        let record: SubscriberCountRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(node_id = %node_id, error = %e,
                    "Failed to decode subscriber count, proceeding without filtering");
                return None;
            }
        };

        match record.subscriber_count.parse::<i64>() {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(node_id = %node_id, value = %record.subscriber_count, error = %e,
                    "Invalid subscriber count value, proceeding without filtering");
                None
            }
        }
    }

    /// Enforce the cap against a (possibly non-numeric) user id.
    pub async fn check(&self, node_id: &str, user_id: &str) -> Result<(), HsiError> {
        if let Some(cap) = self.cap(node_id).await {
            if let Ok(user_id) = user_id.parse::<i64>() {
                if user_id > cap {
                    return Err(HsiError::UserIdExceedsCount);
                }
            }
        }
        Ok(())
    }

    /// Read the stored cap. Unset caps are a hard miss here, unlike the
    /// consulting paths.
    pub async fn get(&self, node_id: &str) -> Result<i64, HsiError> {
        let raw = self
            .store
            .get(&count_key(node_id))
            .await?
            .ok_or(HsiError::CountNotFound)?;

        let record: SubscriberCountRecord =
            serde_json::from_slice(&raw).map_err(|_| HsiError::CountUnreadable)?;
        record
            .subscriber_count
            .parse::<i64>()
            .map_err(|_| HsiError::CountUnreadable)
    }

    /// Upsert the cap with versioned metadata.
    pub async fn put(&self, node_id: &str, count: i64, updated_by: &str) -> Result<(), HsiError> {
        if count < 0 {
            return Err(HsiError::NegativeCount);
        }

        let key = count_key(node_id);
        let resource_version = next_resource_version(&self.store, &key).await?;

        let record = SubscriberCountRecord {
            metadata: SubscriberCountMetadata {
                node: node_id.to_string(),
                resource_version,
                updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                updated_by: updated_by.to_string(),
            },
            subscriber_count: count.to_string(),
        };
        self.store
            .put(&key, serde_json::to_vec(&record)?, None)
            .await?;

        info!(node_id = %node_id, count, updated_by = %updated_by, "Subscriber count updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn test_counts() -> SubscriberCounts {
        SubscriberCounts::new(Arc::new(MemStore::new()))
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let counts = test_counts();
        counts.put("n1", 100, "admin").await.unwrap();
        assert_eq!(counts.get("n1").await.unwrap(), 100);
        assert_eq!(counts.cap("n1").await, Some(100));
    }

    #[tokio::test]
    async fn get_unset_count_is_not_found() {
        let counts = test_counts();
        assert!(matches!(
            counts.get("n1").await,
            Err(HsiError::CountNotFound)
        ));
        assert_eq!(counts.cap("n1").await, None);
    }

    #[tokio::test]
    async fn negative_count_rejected() {
        let counts = test_counts();
        assert!(matches!(
            counts.put("n1", -1, "admin").await,
            Err(HsiError::NegativeCount)
        ));
    }

    #[tokio::test]
    async fn put_bumps_resource_version() {
        let counts = test_counts();
        let store = counts.store.clone();

        counts.put("n1", 5, "admin").await.unwrap();
        counts.put("n1", 10, "admin").await.unwrap();

        let raw = store.get("user_counts/n1/").await.unwrap().unwrap();
        let record: SubscriberCountRecord = serde_json::from_slice(&raw).unwrap();
        assert_eq!(record.metadata.resource_version, "2");
        assert_eq!(record.subscriber_count, "10");
    }

    #[tokio::test]
    async fn check_enforces_cap_for_numeric_ids_only() {
        let counts = test_counts();
        counts.put("n1", 5, "admin").await.unwrap();

        assert!(counts.check("n1", "5").await.is_ok());
        assert!(matches!(
            counts.check("n1", "7").await,
            Err(HsiError::UserIdExceedsCount)
        ));
        assert!(counts.check("n1", "legacy-id").await.is_ok());
        // No cap set for another node.
        assert!(counts.check("n2", "7000").await.is_ok());
    }

    #[tokio::test]
    async fn undecodable_count_means_no_filtering() {
        let counts = test_counts();
        counts
            .store
            .put("user_counts/n1/", b"not json".to_vec(), None)
            .await
            .unwrap();

        assert_eq!(counts.cap("n1").await, None);
        assert!(counts.check("n1", "9999").await.is_ok());
        assert!(matches!(
            counts.get("n1").await,
            Err(HsiError::CountUnreadable)
        ));
    }
}
