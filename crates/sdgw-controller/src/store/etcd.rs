//! etcd-backed [`Store`] implementation.

use etcd_client::{
    Client, EventType, GetOptions, PutOptions, SortOrder, SortTarget, WatchOptions,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    KeyOrder, KvPair, LeaseId, Store, StoreError, WatchEvent, WatchEventKind, WatchStream,
};

/// Shared etcd client. Cloning is cheap; all clones share one connection
/// established at startup.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to the cluster. `endpoints` is a comma-separated list.
    pub async fn connect(endpoints: &str) -> Result<Self, StoreError> {
        let endpoints: Vec<String> = endpoints
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { client })
    }
}

fn op_err(e: etcd_client::Error) -> StoreError {
    StoreError::Operation(e.to_string())
}

#[tonic::async_trait]
impl Store for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await.map_err(op_err)?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn get_prefix(&self, prefix: &str, order: KeyOrder) -> Result<Vec<KvPair>, StoreError> {
        let sort_order = match order {
            KeyOrder::Ascend => SortOrder::Ascend,
            KeyOrder::Descend => SortOrder::Descend,
        };
        let options = GetOptions::new()
            .with_prefix()
            .with_sort(SortTarget::Key, sort_order);

        let mut client = self.client.clone();
        let resp = client.get(prefix, Some(options)).await.map_err(op_err)?;

        Ok(resp
            .kvs()
            .iter()
            .map(|kv| KvPair {
                key: String::from_utf8_lossy(kv.key()).into_owned(),
                value: kv.value().to_vec(),
            })
            .collect())
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<(), StoreError> {
        let options = lease.map(|id| PutOptions::new().with_lease(id));
        let mut client = self.client.clone();
        client.put(key, value, options).await.map_err(op_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut client = self.client.clone();
        let resp = client.delete(key, None).await.map_err(op_err)?;
        Ok(resp.deleted() > 0)
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId, StoreError> {
        let mut client = self.client.clone();
        let resp = client.lease_grant(ttl_secs, None).await.map_err(op_err)?;
        Ok(resp.id())
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        let mut client = self.client.clone();
        let (watcher, mut stream) = client
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(op_err)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            // Dropping the watcher cancels the server-side watch; keep it
            // alive for as long as the pump runs.
            let _watcher = watcher;
            loop {
                match stream.message().await {
                    Ok(Some(resp)) => {
                        for event in resp.events() {
                            let kind = match event.event_type() {
                                EventType::Put => WatchEventKind::Put,
                                EventType::Delete => WatchEventKind::Delete,
                            };
                            let Some(kv) = event.kv() else { continue };
                            let event = WatchEvent {
                                kind,
                                key: String::from_utf8_lossy(kv.key()).into_owned(),
                                value: kv.value().to_vec(),
                            };
                            if tx.send(Ok(event)).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(prefix = %prefix, "Watch stream ended");
                        return;
                    }
                    Err(e) => {
                        warn!(prefix = %prefix, error = %e, "Watch stream error");
                        let _ = tx.send(Err(StoreError::Operation(e.to_string())));
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
