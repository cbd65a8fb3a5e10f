//! Publishes imperative PPPoE commands for nodes to consume.
//!
//! Envelopes are latest-writer-wins: re-issuing a dial refreshes the
//! stored command. The node consumes and deletes them asynchronously;
//! nothing here waits for acknowledgement.

use std::sync::Arc;

use tracing::info;

use super::subscriber_count::SubscriberCounts;
use super::types::{CommandEnvelope, HsiRecord};
use super::HsiError;
use crate::store::Store;
use crate::util::unix_now;

pub const ACTION_DIAL: &str = "dial";
pub const ACTION_HANGUP: &str = "hangup";

#[derive(Clone)]
pub struct CommandPublisher {
    store: Arc<dyn Store>,
    counts: SubscriberCounts,
}

fn command_key(node_id: &str, action: &str, user_id: &str) -> String {
    format!("commands/{node_id}/pppoe_{action}_{user_id}")
}

impl CommandPublisher {
    pub fn new(store: Arc<dyn Store>, counts: SubscriberCounts) -> Self {
        Self { store, counts }
    }

    pub async fn dial(&self, node_id: &str, user_id: &str) -> Result<(), HsiError> {
        self.publish(node_id, user_id, ACTION_DIAL).await
    }

    pub async fn hangup(&self, node_id: &str, user_id: &str) -> Result<(), HsiError> {
        self.publish(node_id, user_id, ACTION_HANGUP).await
    }

    async fn publish(&self, node_id: &str, user_id: &str, action: &str) -> Result<(), HsiError> {
        self.counts.check(node_id, user_id).await?;

        let config_key = format!("configs/{node_id}/hsi/{user_id}");
        let raw = self
            .store
            .get(&config_key)
            .await?
            .ok_or(HsiError::NotFound)?;
        let record: HsiRecord = serde_json::from_slice(&raw)?;

        let envelope = CommandEnvelope {
            action: action.to_string(),
            user_id: user_id.to_string(),
            vlan: record.config.vlan_id,
            account: record.config.account_name,
            password: record.config.password,
            timestamp: unix_now(),
        };
        self.store
            .put(
                &command_key(node_id, action, user_id),
                serde_json::to_vec(&envelope)?,
                None,
            )
            .await?;

        info!(node_id = %node_id, user_id = %user_id, action = %action,
            "PPPoE command published");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hsi::service::HsiService;
    use crate::hsi::types::HsiConfig;
    use crate::store::MemStore;

    async fn publisher_with_config() -> (CommandPublisher, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let counts = SubscriberCounts::new(store.clone());
        let service = HsiService::new(store.clone(), counts.clone());

        service
            .create(
                "n1",
                HsiConfig {
                    user_id: "1".to_string(),
                    vlan_id: "100".to_string(),
                    account_name: "a".to_string(),
                    password: "p".to_string(),
                    dhcp_addr_pool: "192.168.3.100-192.168.3.200".to_string(),
                    dhcp_subnet: "255.255.255.0".to_string(),
                    dhcp_gateway: "192.168.3.1".to_string(),
                },
                "admin",
            )
            .await
            .unwrap();

        (CommandPublisher::new(store.clone(), counts), store)
    }

    #[tokio::test]
    async fn dial_writes_envelope_from_hsi_record() {
        let (publisher, store) = publisher_with_config().await;

        publisher.dial("n1", "1").await.unwrap();

        let raw = store
            .get("commands/n1/pppoe_dial_1")
            .await
            .unwrap()
            .unwrap();
        let envelope: CommandEnvelope = serde_json::from_slice(&raw).unwrap();
        assert_eq!(envelope.action, "dial");
        assert_eq!(envelope.user_id, "1");
        assert_eq!(envelope.vlan, "100");
        assert_eq!(envelope.account, "a");
        assert_eq!(envelope.password, "p");
        assert!(envelope.timestamp > 0);
    }

    #[tokio::test]
    async fn hangup_writes_its_own_key() {
        let (publisher, store) = publisher_with_config().await;

        publisher.hangup("n1", "1").await.unwrap();

        assert!(store
            .get("commands/n1/pppoe_hangup_1")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get("commands/n1/pppoe_dial_1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reissued_dial_overwrites_the_envelope() {
        let (publisher, store) = publisher_with_config().await;

        publisher.dial("n1", "1").await.unwrap();
        publisher.dial("n1", "1").await.unwrap();

        let pairs = store
            .get_prefix("commands/n1/", crate::store::KeyOrder::Ascend)
            .await
            .unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[tokio::test]
    async fn dial_without_config_is_not_found() {
        let (publisher, _) = publisher_with_config().await;
        assert!(matches!(
            publisher.dial("n1", "2").await,
            Err(HsiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn cap_applies_to_commands() {
        let (publisher, _) = publisher_with_config().await;
        publisher.counts.put("n1", 0, "admin").await.unwrap();

        assert!(matches!(
            publisher.dial("n1", "1").await,
            Err(HsiError::UserIdExceedsCount)
        ));
    }
}
