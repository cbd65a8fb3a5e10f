//! In-memory [`Store`] used by tests and local development.
//!
//! Lease expiry is checked against the wall clock on every operation, and
//! expired keys are removed with a Delete notification to watchers, the
//! same way the real store behaves.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use super::{
    KeyOrder, KvPair, LeaseId, Store, StoreError, WatchEvent, WatchEventKind, WatchStream,
};

struct Entry {
    value: Vec<u8>,
    lease: Option<LeaseId>,
}

struct Watcher {
    prefix: String,
    tx: mpsc::UnboundedSender<Result<WatchEvent, StoreError>>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, Entry>,
    leases: HashMap<LeaseId, SystemTime>,
    next_lease: LeaseId,
    watchers: Vec<Watcher>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL remaining on a granted lease, if it is still alive.
    pub fn lease_ttl(&self, lease: LeaseId) -> Option<Duration> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .leases
            .get(&lease)
            .and_then(|expiry| expiry.duration_since(SystemTime::now()).ok())
    }
}

fn purge_expired(inner: &mut Inner) {
    let now = SystemTime::now();
    let expired: Vec<LeaseId> = inner
        .leases
        .iter()
        .filter(|(_, expiry)| **expiry <= now)
        .map(|(id, _)| *id)
        .collect();
    if expired.is_empty() {
        return;
    }

    for id in &expired {
        inner.leases.remove(id);
    }

    let dead: Vec<String> = inner
        .data
        .iter()
        .filter(|(_, entry)| entry.lease.is_some_and(|l| expired.contains(&l)))
        .map(|(key, _)| key.clone())
        .collect();
    for key in dead {
        inner.data.remove(&key);
        notify(inner, WatchEventKind::Delete, &key, &[]);
    }
}

fn notify(inner: &mut Inner, kind: WatchEventKind, key: &str, value: &[u8]) {
    inner.watchers.retain(|w| !w.tx.is_closed());
    for watcher in &inner.watchers {
        if key.starts_with(&watcher.prefix) {
            let _ = watcher.tx.send(Ok(WatchEvent {
                kind,
                key: key.to_string(),
                value: value.to_vec(),
            }));
        }
    }
}

#[tonic::async_trait]
impl Store for MemStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        purge_expired(&mut inner);
        Ok(inner.data.get(key).map(|entry| entry.value.clone()))
    }

    async fn get_prefix(&self, prefix: &str, order: KeyOrder) -> Result<Vec<KvPair>, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        purge_expired(&mut inner);

        let mut pairs: Vec<KvPair> = inner
            .data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| KvPair {
                key: key.clone(),
                value: entry.value.clone(),
            })
            .collect();
        if order == KeyOrder::Descend {
            pairs.reverse();
        }
        Ok(pairs)
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        purge_expired(&mut inner);

        if let Some(id) = lease {
            if !inner.leases.contains_key(&id) {
                return Err(StoreError::Operation(format!("lease {id} not found")));
            }
        }

        inner.data.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                lease,
            },
        );
        notify(&mut inner, WatchEventKind::Put, key, &value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        purge_expired(&mut inner);

        let removed = inner.data.remove(key).is_some();
        if removed {
            notify(&mut inner, WatchEventKind::Delete, key, &[]);
        }
        Ok(removed)
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.next_lease += 1;
        let id = inner.next_lease;
        let ttl = Duration::from_secs(ttl_secs.max(0) as u64);
        let expiry = SystemTime::now() + ttl;
        inner.leases.insert(id, expiry);
        Ok(id)
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.watchers.push(Watcher {
            prefix: prefix.to_string(),
            tx,
        });
        Ok(rx)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = MemStore::new();

        store.put("a/1", b"one".to_vec(), None).await.unwrap();
        assert_eq!(store.get("a/1").await.unwrap(), Some(b"one".to_vec()));

        assert!(store.delete("a/1").await.unwrap());
        assert!(!store.delete("a/1").await.unwrap());
        assert_eq!(store.get("a/1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_prefix_orders_by_key() {
        let store = MemStore::new();
        store.put("n/b", b"2".to_vec(), None).await.unwrap();
        store.put("n/a", b"1".to_vec(), None).await.unwrap();
        store.put("n/c", b"3".to_vec(), None).await.unwrap();
        store.put("other", b"x".to_vec(), None).await.unwrap();

        let asc = store.get_prefix("n/", KeyOrder::Ascend).await.unwrap();
        let keys: Vec<&str> = asc.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["n/a", "n/b", "n/c"]);

        let desc = store.get_prefix("n/", KeyOrder::Descend).await.unwrap();
        let keys: Vec<&str> = desc.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["n/c", "n/b", "n/a"]);
    }

    #[tokio::test]
    async fn leased_key_expires() {
        let store = MemStore::new();
        let lease = store.grant_lease(0).await.unwrap();
        store.put("t/1", b"v".to_vec(), Some(lease)).await.unwrap();

        // Zero TTL means already expired on the next access.
        assert_eq!(store.get("t/1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn leased_key_survives_until_expiry() {
        let store = MemStore::new();
        let lease = store.grant_lease(3600).await.unwrap();
        store.put("t/1", b"v".to_vec(), Some(lease)).await.unwrap();

        assert_eq!(store.get("t/1").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.lease_ttl(lease).unwrap() <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn put_with_unknown_lease_fails() {
        let store = MemStore::new();
        let err = store.put("t/1", b"v".to_vec(), Some(99)).await.unwrap_err();
        assert!(matches!(err, StoreError::Operation(_)));
    }

    #[tokio::test]
    async fn watch_sees_puts_and_deletes_under_prefix() {
        let store = MemStore::new();
        let mut stream = store.watch_prefix("w/").await.unwrap();

        store.put("w/1", b"v".to_vec(), None).await.unwrap();
        store.put("other/1", b"v".to_vec(), None).await.unwrap();
        store.delete("w/1").await.unwrap();

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first.kind, WatchEventKind::Put);
        assert_eq!(first.key, "w/1");
        assert_eq!(first.value, b"v");

        let second = stream.recv().await.unwrap().unwrap();
        assert_eq!(second.kind, WatchEventKind::Delete);
        assert_eq!(second.key, "w/1");
    }
}
