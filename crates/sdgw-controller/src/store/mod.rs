//! Typed access to the shared key-value store.
//!
//! Every stateful component talks to the store through the [`Store`] trait,
//! so the whole service can run against a real etcd cluster ([`EtcdStore`])
//! or an in-process map ([`MemStore`]) in tests.
//!
//! The adapter never retries: transient errors surface to callers
//! unchanged. Deadlines are applied at call sites via [`deadline`].

mod etcd;
mod memory;

pub use etcd::EtcdStore;
pub use memory::MemStore;

use std::time::Duration;

use tokio::sync::mpsc;

/// Lease identifier returned by [`Store::grant_lease`].
pub type LeaseId = i64;

/// A key-value pair returned by ranged reads.
#[derive(Debug, Clone)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
}

/// Key ordering for [`Store::get_prefix`] results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    Ascend,
    Descend,
}

/// Change notification produced by a prefix watch.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// Stream of watch notifications. The sender side closes when the
/// underlying watch terminates.
pub type WatchStream = mpsc::UnboundedReceiver<Result<WatchEvent, StoreError>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store operation failed: {0}")]
    Operation(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability handle over the shared ordered key-value store.
#[tonic::async_trait]
pub trait Store: Send + Sync {
    /// Point read. `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Ranged read of every key under `prefix`, ordered by key.
    async fn get_prefix(&self, prefix: &str, order: KeyOrder) -> Result<Vec<KvPair>, StoreError>;

    /// Write a value, optionally bound to a lease.
    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>)
        -> Result<(), StoreError>;

    /// Remove a key. Returns whether a key was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Grant a lease; keys written under it are removed by the store when
    /// the lease expires.
    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId, StoreError>;

    /// Watch every key under `prefix` for puts and deletes.
    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError>;
}

/// Apply a deadline to a store operation.
pub async fn deadline<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, StoreError>> + Send,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_passes_through_results() {
        let ok = deadline(Duration::from_secs(1), async { Ok::<_, StoreError>(42) }).await;
        assert_eq!(ok.unwrap(), 42);

        let err = deadline(Duration::from_secs(1), async {
            Err::<(), _>(StoreError::Operation("boom".into()))
        })
        .await;
        assert!(matches!(err, Err(StoreError::Operation(_))));
    }

    #[tokio::test]
    async fn deadline_times_out() {
        let result = deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
