//! The long-lived watch task and the history read side.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::types::FailedEvent;
use crate::store::{deadline, KeyOrder, Store, WatchEvent};

/// History entries expire after seven days.
const HISTORY_TTL_SECS: i64 = 604_800;
const HISTORY_WRITE_DEADLINE: Duration = Duration::from_secs(3);

const SOURCE_PREFIX: &str = "failed_events/";
const HISTORY_PREFIX: &str = "failed_events_history/";

/// Spawn the pipeline task: prefix-watch `failed_events/` and promote
/// every decodable report into the TTL'd history keyspace. The task ends
/// on shutdown, on watch error, or when the watch stream closes; the
/// process supervisor is responsible for restarts.
pub fn spawn_failed_events_pipeline(
    store: Arc<dyn Store>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = match store.watch_prefix(SOURCE_PREFIX).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to start failed-events watch");
                return;
            }
        };

        info!("Started watching failed_events/");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Failed events watcher shutting down");
                    return;
                }
                event = stream.recv() => match event {
                    Some(Ok(event)) => handle_event(store.as_ref(), &event).await,
                    Some(Err(e)) => {
                        warn!(error = %e, "Failed events watcher stopped with error");
                        return;
                    }
                    None => {
                        warn!("Failed events watch stream closed");
                        return;
                    }
                }
            }
        }
    })
}

async fn handle_event(store: &dyn Store, event: &WatchEvent) {
    // Delete notifications carry no value and fail to decode, which is
    // exactly the skip we want.
    let failed: FailedEvent = match serde_json::from_slice(&event.value) {
        Ok(failed) => failed,
        Err(e) => {
            warn!(key = %event.key, error = %e, "Failed to parse failed event JSON");
            return;
        }
    };

    warn!(
        event_type = %failed.event_type,
        node_id = %failed.node_id,
        user_id = %failed.user_id,
        error_code = failed.error_reason_code,
        error_name = %failed.error_reason_name,
        error_detail = %failed.error_detail,
        key = %event.key,
        "Failed event detected from node"
    );

    let history_key = format!("{HISTORY_PREFIX}{}/{}", failed.node_id, failed.timestamp);
    let payload = match serde_json::to_vec(&failed) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to encode failed event for history");
            return;
        }
    };

    let result = deadline(HISTORY_WRITE_DEADLINE, async {
        let lease = store.grant_lease(HISTORY_TTL_SECS).await?;
        store.put(&history_key, payload, Some(lease)).await
    })
    .await;

    match result {
        Ok(()) => debug!(history_key = %history_key, "Stored failed event in history"),
        Err(e) => error!(history_key = %history_key, error = %e,
            "Failed to store failed event history"),
    }
}

/// History entries, newest first, for one node or all of them, with an
/// optional exact-match event-type filter. Undecodable entries are
/// skipped.
pub async fn read_history(
    store: &dyn Store,
    node_id: Option<&str>,
    event_type: Option<&str>,
) -> Result<Vec<serde_json::Value>, crate::store::StoreError> {
    let prefix = match node_id {
        Some(node_id) => format!("{HISTORY_PREFIX}{node_id}/"),
        None => HISTORY_PREFIX.to_string(),
    };

    let pairs = store.get_prefix(&prefix, KeyOrder::Descend).await?;

    let mut events = Vec::new();
    for pair in pairs {
        let Ok(event) = serde_json::from_slice::<serde_json::Value>(&pair.value) else {
            warn!(key = %pair.key, "Skipping undecodable failed event");
            continue;
        };
        if let Some(filter) = event_type {
            if let Some(event_type) = event.get("event_type").and_then(|v| v.as_str()) {
                if event_type != filter {
                    continue;
                }
            }
        }
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    async fn wait_for_key(store: &MemStore, key: &str) -> Vec<u8> {
        let store = store.clone();
        let key = key.to_string();
        tokio::time::timeout(Duration::from_secs(2), async move {
            loop {
                if let Some(value) = store.get(&key).await.unwrap() {
                    return value;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("history entry never appeared")
    }

    #[tokio::test]
    async fn promotes_reports_into_history() {
        let store = Arc::new(MemStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_failed_events_pipeline(store.clone(), shutdown_rx);

        let report = br#"{"event_type":"pppoe_dial","node_id":"n1","user_id":"1",
            "error_reason_code":101,"error_reason_name":"AUTH_FAILED",
            "error_detail":"CHAP rejected","timestamp":1700000000}"#;
        store
            .put("failed_events/x", report.to_vec(), None)
            .await
            .unwrap();

        let raw = wait_for_key(&store, "failed_events_history/n1/1700000000").await;
        let stored: FailedEvent = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.event_type, "pppoe_dial");
        assert_eq!(stored.error_reason_code, 101);

        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }

    #[tokio::test]
    async fn skips_undecodable_reports() {
        let store = Arc::new(MemStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_failed_events_pipeline(store.clone(), shutdown_rx);

        store
            .put("failed_events/bad", b"not json".to_vec(), None)
            .await
            .unwrap();
        let report = br#"{"event_type":"dhcp","node_id":"n2","timestamp":5}"#;
        store
            .put("failed_events/good", report.to_vec(), None)
            .await
            .unwrap();

        // The good report lands; the bad one produced no history.
        wait_for_key(&store, "failed_events_history/n2/5").await;
        let history = store
            .get_prefix(HISTORY_PREFIX, KeyOrder::Ascend)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }

    #[tokio::test]
    async fn read_history_orders_and_filters() {
        let store = MemStore::new();
        for (node, ts, event_type) in [
            ("n1", 100, "pppoe_dial"),
            ("n1", 200, "pppoe_hangup"),
            ("n2", 150, "pppoe_dial"),
        ] {
            let value = format!(
                r#"{{"event_type":"{event_type}","node_id":"{node}","timestamp":{ts}}}"#
            );
            store
                .put(
                    &format!("failed_events_history/{node}/{ts}"),
                    value.into_bytes(),
                    None,
                )
                .await
                .unwrap();
        }

        let all = read_history(&store, None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        // Descending key order: n2/150, n1/200, n1/100.
        assert_eq!(all[0]["node_id"], "n2");
        assert_eq!(all[1]["timestamp"], 200);

        let n1 = read_history(&store, Some("n1"), None).await.unwrap();
        assert_eq!(n1.len(), 2);
        assert_eq!(n1[0]["timestamp"], 200);

        let dials = read_history(&store, None, Some("pppoe_dial")).await.unwrap();
        assert_eq!(dials.len(), 2);
    }

    #[tokio::test]
    async fn read_history_keeps_events_without_type_field() {
        let store = MemStore::new();
        store
            .put(
                "failed_events_history/n1/1",
                br#"{"node_id":"n1","timestamp":1}"#.to_vec(),
                None,
            )
            .await
            .unwrap();

        let filtered = read_history(&store, None, Some("pppoe_dial")).await.unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
