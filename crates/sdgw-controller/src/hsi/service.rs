//! CRUD over versioned HSI documents.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::info;

use super::subscriber_count::SubscriberCounts;
use super::types::{HsiConfig, HsiMetadata, HsiRecord};
use super::{next_resource_version, validate, HsiError};
use crate::store::{KeyOrder, Store};

/// `enableStatus` stamped on newly created records; the node side flips it
/// when the configuration is applied.
const ENABLE_STATUS_DISABLED: &str = "disabled";

/// Placeholder when the prior record's status cannot be determined.
const ENABLE_STATUS_UNKNOWN: &str = "unknown";

#[derive(Clone)]
pub struct HsiService {
    store: Arc<dyn Store>,
    counts: SubscriberCounts,
}

fn record_key(node_id: &str, user_id: &str) -> String {
    format!("configs/{node_id}/hsi/{user_id}")
}

fn node_prefix(node_id: &str) -> String {
    format!("configs/{node_id}/hsi/")
}

impl HsiService {
    pub fn new(store: Arc<dyn Store>, counts: SubscriberCounts) -> Self {
        Self { store, counts }
    }

    /// User ids under a node, from key suffixes. Numeric ids above the
    /// subscriber cap are filtered out; non-numeric ids are kept.
    pub async fn list_user_ids(&self, node_id: &str) -> Result<Vec<String>, HsiError> {
        let prefix = node_prefix(node_id);
        let pairs = self.store.get_prefix(&prefix, KeyOrder::Ascend).await?;
        let cap = self.counts.cap(node_id).await;

        let mut user_ids = Vec::new();
        for pair in pairs {
            let Some(user_id) = pair.key.strip_prefix(&prefix) else {
                continue;
            };
            if user_id.is_empty() {
                continue;
            }
            if let Some(cap) = cap {
                if let Ok(numeric) = user_id.parse::<i64>() {
                    if numeric > cap {
                        continue;
                    }
                }
            }
            user_ids.push(user_id.to_string());
        }
        Ok(user_ids)
    }

    /// Full stored document for one subscriber.
    pub async fn get(&self, node_id: &str, user_id: &str) -> Result<HsiRecord, HsiError> {
        self.counts.check(node_id, user_id).await?;

        let raw = self
            .store
            .get(&record_key(node_id, user_id))
            .await?
            .ok_or(HsiError::NotFound)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn create(
        &self,
        node_id: &str,
        config: HsiConfig,
        updated_by: &str,
    ) -> Result<(), HsiError> {
        validate::validate_config(&config)?;
        self.counts.check(node_id, &config.user_id).await?;
        self.ensure_vlan_free(node_id, &config.vlan_id, &config.user_id)
            .await?;

        let key = record_key(node_id, &config.user_id);
        let resource_version = next_resource_version(&self.store, &key).await?;

        let user_id = config.user_id.clone();
        let record = HsiRecord {
            config,
            metadata: HsiMetadata {
                node: node_id.to_string(),
                resource_version: resource_version.clone(),
                updated_by: updated_by.to_string(),
                updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                enable_status: ENABLE_STATUS_DISABLED.to_string(),
            },
        };
        self.store
            .put(&key, serde_json::to_vec(&record)?, None)
            .await?;

        info!(node_id = %node_id, user_id = %user_id, version = %resource_version,
            updated_by = %updated_by, "HSI config created");
        Ok(())
    }

    /// Update an existing subscriber. The body's user id must match the
    /// path, and `enableStatus` carries over from the prior record.
    pub async fn update(
        &self,
        node_id: &str,
        user_id: &str,
        config: HsiConfig,
        updated_by: &str,
    ) -> Result<(), HsiError> {
        if config.user_id != user_id {
            return Err(HsiError::UserIdMismatch);
        }
        validate::validate_config(&config)?;
        self.counts.check(node_id, &config.user_id).await?;
        self.ensure_vlan_free(node_id, &config.vlan_id, user_id)
            .await?;

        let key = record_key(node_id, user_id);
        let resource_version = next_resource_version(&self.store, &key).await?;
        let enable_status = self.enable_status(node_id, user_id).await?;

        let record = HsiRecord {
            config,
            metadata: HsiMetadata {
                node: node_id.to_string(),
                resource_version: resource_version.clone(),
                updated_by: updated_by.to_string(),
                updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                enable_status,
            },
        };
        self.store
            .put(&key, serde_json::to_vec(&record)?, None)
            .await?;

        info!(node_id = %node_id, user_id = %user_id, version = %resource_version,
            updated_by = %updated_by, "HSI config updated");
        Ok(())
    }

    /// Delete one subscriber's record. No cascade to commands or history.
    pub async fn delete(&self, node_id: &str, user_id: &str) -> Result<(), HsiError> {
        self.counts.check(node_id, user_id).await?;

        let key = record_key(node_id, user_id);
        if self.store.get(&key).await?.is_none() {
            return Err(HsiError::NotFound);
        }
        self.store.delete(&key).await?;

        info!(node_id = %node_id, user_id = %user_id, "HSI config deleted");
        Ok(())
    }

    /// Fail when another user on the node already holds the VLAN. The
    /// scan and the subsequent write are separate round-trips; concurrent
    /// creators racing the same VLAN can both pass.
    async fn ensure_vlan_free(
        &self,
        node_id: &str,
        vlan_id: &str,
        current_user: &str,
    ) -> Result<(), HsiError> {
        let pairs = self
            .store
            .get_prefix(&node_prefix(node_id), KeyOrder::Ascend)
            .await?;

        for pair in pairs {
            let Ok(record) = serde_json::from_slice::<HsiRecord>(&pair.value) else {
                continue;
            };
            if record.config.vlan_id == vlan_id && record.config.user_id != current_user {
                return Err(HsiError::VlanInUse {
                    user_id: record.config.user_id,
                });
            }
        }
        Ok(())
    }

    async fn enable_status(&self, node_id: &str, user_id: &str) -> Result<String, HsiError> {
        let Some(raw) = self.store.get(&record_key(node_id, user_id)).await? else {
            return Ok(ENABLE_STATUS_UNKNOWN.to_string());
        };
        let record: HsiRecord = serde_json::from_slice(&raw)?;
        Ok(record.metadata.enable_status)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn test_service() -> (HsiService, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let counts = SubscriberCounts::new(store.clone());
        (HsiService::new(store.clone(), counts), store)
    }

    fn sample_config(user_id: &str, vlan_id: &str) -> HsiConfig {
        HsiConfig {
            user_id: user_id.to_string(),
            vlan_id: vlan_id.to_string(),
            account_name: "acct".to_string(),
            password: "secret".to_string(),
            dhcp_addr_pool: "192.168.3.100-192.168.3.200".to_string(),
            dhcp_subnet: "255.255.255.0".to_string(),
            dhcp_gateway: "192.168.3.1".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let (service, _) = test_service();

        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        let record = service.get("n1", "1").await.unwrap();
        assert_eq!(record.config, sample_config("1", "100"));
        assert_eq!(record.metadata.resource_version, "1");
        assert_eq!(record.metadata.enable_status, "disabled");
        assert_eq!(record.metadata.updated_by, "admin");
        assert_eq!(record.metadata.node, "n1");
    }

    #[tokio::test]
    async fn get_missing_record_is_not_found() {
        let (service, _) = test_service();
        assert!(matches!(
            service.get("n1", "1").await,
            Err(HsiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_bumps_version_and_keeps_enable_status() {
        let (service, store) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        // Simulate the node side enabling the configuration.
        let raw = store.get("configs/n1/hsi/1").await.unwrap().unwrap();
        let mut record: HsiRecord = serde_json::from_slice(&raw).unwrap();
        record.metadata.enable_status = "enabled".to_string();
        store
            .put(
                "configs/n1/hsi/1",
                serde_json::to_vec(&record).unwrap(),
                None,
            )
            .await
            .unwrap();

        service
            .update("n1", "1", sample_config("1", "200"), "operator")
            .await
            .unwrap();

        let record = service.get("n1", "1").await.unwrap();
        assert_eq!(record.config.vlan_id, "200");
        assert_eq!(record.metadata.resource_version, "2");
        assert_eq!(record.metadata.enable_status, "enabled");
        assert_eq!(record.metadata.updated_by, "operator");
    }

    #[tokio::test]
    async fn update_requires_matching_user_id() {
        let (service, _) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        let err = service
            .update("n1", "1", sample_config("2", "100"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, HsiError::UserIdMismatch));

        // The mismatch is reported even when the body is also structurally
        // invalid; the id equality check runs first.
        let mut config = sample_config("2", "4001");
        config.account_name.clear();
        let err = service.update("n1", "1", config, "admin").await.unwrap_err();
        assert!(matches!(err, HsiError::UserIdMismatch));
    }

    #[tokio::test]
    async fn vlan_conflict_names_the_holder() {
        let (service, _) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        let err = service
            .create("n1", sample_config("2", "100"), "admin")
            .await
            .unwrap_err();
        match err {
            HsiError::VlanInUse { user_id } => assert_eq!(user_id, "1"),
            other => panic!("expected VlanInUse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_user_can_keep_its_vlan() {
        let (service, _) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        // Re-submitting the same user with the same VLAN is an update, not
        // a conflict.
        service
            .update("n1", "1", sample_config("1", "100"), "admin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn vlans_are_scoped_per_node() {
        let (service, _) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();
        service
            .create("n2", sample_config("1", "100"), "admin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_respects_subscriber_cap() {
        let (service, _) = test_service();
        service.counts.put("n1", 5, "admin").await.unwrap();

        let err = service
            .create("n1", sample_config("7", "100"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, HsiError::UserIdExceedsCount));

        service
            .create("n1", sample_config("5", "100"), "admin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_filters_numeric_ids_above_cap() {
        let (service, store) = test_service();
        service
            .create("n1", sample_config("3", "100"), "admin")
            .await
            .unwrap();
        service
            .create("n1", sample_config("7", "200"), "admin")
            .await
            .unwrap();
        // Legacy non-numeric id written directly.
        store
            .put(
                "configs/n1/hsi/legacy-a",
                serde_json::to_vec(&HsiRecord {
                    config: sample_config("legacy-a", "300"),
                    metadata: HsiMetadata::default(),
                })
                .unwrap(),
                None,
            )
            .await
            .unwrap();

        service.counts.put("n1", 5, "admin").await.unwrap();

        let user_ids = service.list_user_ids("n1").await.unwrap();
        assert_eq!(user_ids, vec!["3", "legacy-a"]);
    }

    #[tokio::test]
    async fn delete_requires_existing_record() {
        let (service, store) = test_service();
        service
            .create("n1", sample_config("1", "100"), "admin")
            .await
            .unwrap();

        service.delete("n1", "1").await.unwrap();
        assert_eq!(store.get("configs/n1/hsi/1").await.unwrap(), None);

        assert!(matches!(
            service.delete("n1", "1").await,
            Err(HsiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn rejects_structurally_invalid_config() {
        let (service, _) = test_service();

        let mut config = sample_config("1", "100");
        config.vlan_id = "4001".to_string();
        assert!(matches!(
            service.create("n1", config, "admin").await,
            Err(HsiError::VlanIdOutOfRange)
        ));
    }
}
