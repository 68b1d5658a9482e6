//! Process-local shared registry.
//!
//! [`InMemoryRegistry`] implements the full [`RoomRegistry`] contract for
//! clients running in one process: tests, simulations, and single-machine
//! demos. Share one instance between clients via `Arc`.
//!
//! The counter increment is linearizable because every mutation runs under
//! one async mutex; watch notifications are fanned out over unbounded
//! channels in update order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RendezvousError, Result};
use crate::protocol::{now_ms, RoomRecord};
use crate::registry::{RoomRegistry, RoomWatch, WatchId};

struct Watcher {
    code: String,
    tx: mpsc::UnboundedSender<RoomRecord>,
}

#[derive(Default)]
struct Inner {
    last_room_code: u64,
    rooms: HashMap<String, RoomRecord>,
    watchers: HashMap<WatchId, Watcher>,
}

impl Inner {
    /// Deliver the record to every watcher of `code`, pruning watchers whose
    /// receiver has gone away.
    fn notify(&mut self, code: &str) {
        let Some(record) = self.rooms.get(code).cloned() else {
            return;
        };
        self.watchers.retain(|_, watcher| {
            watcher.code != code || watcher.tx.send(record.clone()).is_ok()
        });
    }
}

/// In-memory [`RoomRegistry`] for tests and single-process use.
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
    /// Simulates an unreachable store; every operation fails while set.
    offline: AtomicBool,
}

impl InMemoryRegistry {
    /// Create an empty registry with the counter at 0 (first code is `"1"`).
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Snapshot of the record at `code`, if any.
    pub async fn room(&self, code: &str) -> Option<RoomRecord> {
        self.inner.lock().await.rooms.get(code).cloned()
    }

    /// Number of live watch subscriptions, across all codes.
    pub async fn watcher_count(&self) -> usize {
        self.inner.lock().await.watchers.len()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Acquire) {
            Err(RendezvousError::RegistryUnavailable(
                "in-memory registry is offline".into(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRegistry {
    async fn allocate_next_code(&self) -> Result<String> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.last_room_code += 1;
        Ok(inner.last_room_code.to_string())
    }

    async fn create_room(&self, code: &str, record: &RoomRecord) -> Result<()> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.rooms.insert(code.to_owned(), record.clone());
        inner.notify(code);
        Ok(())
    }

    async fn publish_hosted_anchor(&self, code: &str, anchor_id: &str) -> Result<()> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        // Upsert: a direct publish against a code whose initial record write
        // has not landed yet still creates the path, like a child write in a
        // tree-shaped store.
        let record = inner
            .rooms
            .entry(code.to_owned())
            .or_insert_with(|| RoomRecord::new(code, now_ms()));
        record.hosted_anchor_id = Some(anchor_id.to_owned());
        record.updated_at_timestamp = now_ms();
        inner.notify(code);
        Ok(())
    }

    async fn watch(&self, code: &str) -> Result<RoomWatch> {
        self.check_online()?;
        let (tx, updates) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        // Deliver the current value first, when a record already exists.
        if let Some(record) = inner.rooms.get(code) {
            let _ = tx.send(record.clone());
        }
        let id = Uuid::new_v4();
        inner.watchers.insert(
            id,
            Watcher {
                code: code.to_owned(),
                tx,
            },
        );
        debug!(%id, code, "watch installed");
        Ok(RoomWatch { id, updates })
    }

    async fn unwatch(&self, id: WatchId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.watchers.remove(&id).is_some() {
            debug!(%id, "watch removed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn codes_are_sequential_decimal_strings() {
        let registry = InMemoryRegistry::new();
        assert_eq!(registry.allocate_next_code().await.unwrap(), "1");
        assert_eq!(registry.allocate_next_code().await.unwrap(), "2");
        assert_eq!(registry.allocate_next_code().await.unwrap(), "3");
    }

    #[tokio::test]
    async fn offline_registry_fails_every_operation() {
        let registry = InMemoryRegistry::new();
        registry.set_offline(true);
        assert!(matches!(
            registry.allocate_next_code().await,
            Err(RendezvousError::RegistryUnavailable(_))
        ));
        assert!(registry.watch("1").await.is_err());

        registry.set_offline(false);
        assert_eq!(registry.allocate_next_code().await.unwrap(), "1");
    }

    #[tokio::test]
    async fn watch_starts_with_current_value() {
        let registry = InMemoryRegistry::new();
        let record = RoomRecord::new("5", 10);
        registry.create_room("5", &record).await.unwrap();

        let mut watch = registry.watch("5").await.unwrap();
        let first = watch.updates.recv().await.unwrap();
        assert_eq!(first, record);
    }

    #[tokio::test]
    async fn watch_on_missing_room_delivers_nothing_until_created() {
        let registry = InMemoryRegistry::new();
        let mut watch = registry.watch("9").await.unwrap();
        assert!(watch.updates.try_recv().is_err());

        registry
            .create_room("9", &RoomRecord::new("9", 1))
            .await
            .unwrap();
        let record = watch.updates.recv().await.unwrap();
        assert_eq!(record.display_name, "9");
        assert!(record.hosted_anchor_id.is_none());
    }

    #[tokio::test]
    async fn unwatch_stops_delivery() {
        let registry = InMemoryRegistry::new();
        let mut watch = registry.watch("1").await.unwrap();
        registry.unwatch(watch.id).await.unwrap();

        registry
            .create_room("1", &RoomRecord::new("1", 1))
            .await
            .unwrap();
        // Channel closed, not merely empty.
        assert!(watch.updates.recv().await.is_none());
        assert_eq!(registry.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn publish_upserts_and_is_idempotent() {
        let registry = InMemoryRegistry::new();
        // No create_room first: publish creates the path.
        registry.publish_hosted_anchor("3", "cid-x").await.unwrap();
        registry.publish_hosted_anchor("3", "cid-x").await.unwrap();

        let record = registry.room("3").await.unwrap();
        assert_eq!(record.hosted_anchor_id.as_deref(), Some("cid-x"));
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_notify() {
        let registry = InMemoryRegistry::new();
        let watch = registry.watch("1").await.unwrap();
        drop(watch.updates);

        registry
            .create_room("1", &RoomRecord::new("1", 1))
            .await
            .unwrap();
        assert_eq!(registry.watcher_count().await, 0);
    }
}
