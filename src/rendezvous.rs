//! Room allocation and hosted-anchor discovery over a [`RoomRegistry`].
//!
//! [`RendezvousProtocol`] is the thin protocol layer between the session
//! state machine and the shared store: it allocates room codes through the
//! atomic counter, writes the initial room record, publishes hosted anchor
//! ids, and watches a room until an id appears.
//!
//! A protocol instance tracks at most one active watch, matching the
//! single-active-session model of the client.
//!
//! Watching is two-phase: [`begin_watch`](RendezvousProtocol::begin_watch)
//! records the intent synchronously and returns a [`WatchToken`];
//! [`watch_for_hosted_anchor`](RendezvousProtocol::watch_for_hosted_anchor)
//! performs the store round trip and waits. The split lets a caller register
//! the watch before handing the wait to another task, so a
//! [`stop_watching`](RendezvousProtocol::stop_watching) issued at any point
//! afterward — including while the store round trip is still in flight —
//! reliably tears the subscription down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{RendezvousError, Result};
use crate::protocol::{now_ms, CloudAnchorId, RoomRecord};
use crate::registry::{RoomRegistry, WatchId};

enum WatchPhase {
    /// `begin_watch` has run; the store round trip has not completed.
    /// `cancelled` is set by `stop_watching` racing the installation.
    Installing { cancelled: bool },
    /// The subscription is live in the registry.
    Installed { id: WatchId },
}

struct ActiveWatch {
    code: String,
    epoch: u64,
    phase: WatchPhase,
}

/// Token returned by [`RendezvousProtocol::begin_watch`], consumed by
/// [`RendezvousProtocol::watch_for_hosted_anchor`].
#[derive(Debug)]
pub struct WatchToken {
    code: String,
    epoch: u64,
}

/// Rendezvous operations over a shared room registry.
pub struct RendezvousProtocol<R: RoomRegistry> {
    registry: Arc<R>,
    active_watch: Arc<Mutex<Option<ActiveWatch>>>,
    watch_epoch: Arc<AtomicU64>,
}

impl<R: RoomRegistry> Clone for RendezvousProtocol<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            active_watch: Arc::clone(&self.active_watch),
            watch_epoch: Arc::clone(&self.watch_epoch),
        }
    }
}

impl<R: RoomRegistry> RendezvousProtocol<R> {
    /// Create a protocol layer over the given registry.
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            active_watch: Arc::new(Mutex::new(None)),
            watch_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Allocate the next room code and write the room's initial record.
    ///
    /// Resolves with the code as soon as the counter transaction commits.
    /// The record write is fire-and-forget: it is spawned in the background
    /// and only logged on failure, so a resolver may briefly observe a code
    /// with no record yet — it sees no change events and keeps waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::RoomCreationFailed`] if the counter
    /// transaction fails.
    pub async fn create_room(&self) -> Result<String> {
        let code = self.registry.allocate_next_code().await.map_err(|e| {
            warn!("room code allocation failed: {e}");
            RendezvousError::RoomCreationFailed
        })?;

        let record = RoomRecord::new(&code, now_ms());
        let registry = Arc::clone(&self.registry);
        let room_code = code.clone();
        tokio::spawn(async move {
            if let Err(e) = registry.create_room(&room_code, &record).await {
                warn!(%room_code, "initial room record write failed: {e}");
            }
        });

        Ok(code)
    }

    /// Record the intent to watch `code` and return the token that starts
    /// the wait.
    ///
    /// From this point on, [`stop_watching`](Self::stop_watching) for `code`
    /// cancels the watch even while the registry subscription is still being
    /// installed. One watch per protocol instance: any leftover watch is
    /// replaced.
    pub async fn begin_watch(&self, code: &str) -> WatchToken {
        let epoch = self.watch_epoch.fetch_add(1, Ordering::Relaxed) + 1;
        let mut active = self.active_watch.lock().await;
        if let Some(prev) = active.take() {
            debug!(code = %prev.code, "replacing leftover watch");
            // A still-installing leftover tears itself down once its store
            // round trip completes and finds its entry gone.
            if let WatchPhase::Installed { id } = prev.phase {
                if let Err(e) = self.registry.unwatch(id).await {
                    warn!(code = %prev.code, "failed to tear down leftover watch: {e}");
                }
            }
        }
        *active = Some(ActiveWatch {
            code: code.to_owned(),
            epoch,
            phase: WatchPhase::Installing { cancelled: false },
        });
        WatchToken {
            code: code.to_owned(),
            epoch,
        }
    }

    /// Watch the token's room until a hosted anchor id appears, then tear
    /// down the subscription and return the id.
    ///
    /// Change events without a `hosted_anchor_id` field (such as the one
    /// fired by room creation) are ignored. There is no timeout: with no
    /// hosting client the future only completes when the watch is cancelled.
    ///
    /// # Errors
    ///
    /// - [`RendezvousError::RegistryUnavailable`] if the subscription cannot
    ///   be installed.
    /// - [`RendezvousError::WatchCancelled`] if [`stop_watching`](Self::stop_watching)
    ///   or a newer [`begin_watch`](Self::begin_watch) cancels the watch —
    ///   before, during, or after the installation round trip. Callers treat
    ///   this as cancellation, not as a user-visible failure.
    pub async fn watch_for_hosted_anchor(&self, token: WatchToken) -> Result<CloudAnchorId> {
        let WatchToken { code, epoch } = token;

        // Cancelled or superseded while queued: skip the store round trip.
        {
            let mut active = self.active_watch.lock().await;
            let live = active.as_ref().is_some_and(|a| {
                a.epoch == epoch && !matches!(a.phase, WatchPhase::Installing { cancelled: true })
            });
            if !live {
                if active.as_ref().is_some_and(|a| a.epoch == epoch) {
                    *active = None;
                }
                return Err(RendezvousError::WatchCancelled);
            }
        }

        let mut watch = match self.registry.watch(&code).await {
            Ok(watch) => watch,
            Err(e) => {
                let mut active = self.active_watch.lock().await;
                if active.as_ref().is_some_and(|a| a.epoch == epoch) {
                    *active = None;
                }
                return Err(e);
            }
        };

        // The round trip may have raced a stop_watching call or a newer
        // watch; the fresh subscription must not outlive either.
        let keep = {
            let mut active = self.active_watch.lock().await;
            let keep = active.as_ref().is_some_and(|a| {
                a.epoch == epoch && !matches!(a.phase, WatchPhase::Installing { cancelled: true })
            });
            if keep {
                if let Some(a) = active.as_mut() {
                    a.phase = WatchPhase::Installed { id: watch.id };
                }
            } else if active.as_ref().is_some_and(|a| a.epoch == epoch) {
                *active = None;
            }
            keep
        };
        if !keep {
            if let Err(e) = self.registry.unwatch(watch.id).await {
                warn!(%code, "failed to tear down cancelled watch: {e}");
            }
            return Err(RendezvousError::WatchCancelled);
        }

        while let Some(record) = watch.updates.recv().await {
            let Some(anchor_id) = record.hosted_anchor_id else {
                debug!(%code, "room changed without hosted anchor id");
                continue;
            };
            {
                let mut active = self.active_watch.lock().await;
                if active.as_ref().is_some_and(|a| a.epoch == epoch) {
                    *active = None;
                }
            }
            if let Err(e) = self.registry.unwatch(watch.id).await {
                warn!(%code, "failed to tear down watch: {e}");
            }
            debug!(%code, %anchor_id, "hosted anchor id observed");
            return Ok(anchor_id);
        }

        // Sender side torn down by stop_watching (or the registry went away).
        Err(RendezvousError::WatchCancelled)
    }

    /// Cancel the active watch for `code`, if there is one.
    ///
    /// The pending [`watch_for_hosted_anchor`](Self::watch_for_hosted_anchor)
    /// call then completes with [`RendezvousError::WatchCancelled`]. A watch
    /// whose installation round trip is still in flight is marked cancelled
    /// and removed by the install path as soon as the round trip completes.
    /// Calling this with no active watch, or for a different code, is a
    /// no-op.
    pub async fn stop_watching(&self, code: &str) -> Result<()> {
        let installed = {
            let mut active = self.active_watch.lock().await;
            let installed = match active.as_mut() {
                Some(a) if a.code == code => match &mut a.phase {
                    WatchPhase::Installed { id } => Some(*id),
                    WatchPhase::Installing { cancelled } => {
                        *cancelled = true;
                        None
                    }
                },
                _ => None,
            };
            if installed.is_some() {
                *active = None;
            }
            installed
        };
        if let Some(id) = installed {
            self.registry.unwatch(id).await?;
        }
        Ok(())
    }

    /// Publish the hosted anchor id under the session's own room code.
    pub async fn publish_hosted_anchor(&self, code: &str, anchor_id: &str) -> Result<()> {
        self.registry.publish_hosted_anchor(code, anchor_id).await
    }
}

#[cfg(all(test, feature = "registry-memory"))]
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
    use crate::registries::InMemoryRegistry;
    use crate::registry::RoomWatch;
    use async_trait::async_trait;
    use std::time::Duration;

    fn protocol() -> (RendezvousProtocol<InMemoryRegistry>, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        (RendezvousProtocol::new(Arc::clone(&registry)), registry)
    }

    /// Registry whose `watch` takes a store round trip's worth of time.
    struct SlowWatchRegistry {
        inner: Arc<InMemoryRegistry>,
        watch_delay: Duration,
    }

    #[async_trait]
    impl RoomRegistry for SlowWatchRegistry {
        async fn allocate_next_code(&self) -> Result<String> {
            self.inner.allocate_next_code().await
        }

        async fn create_room(&self, code: &str, record: &RoomRecord) -> Result<()> {
            self.inner.create_room(code, record).await
        }

        async fn publish_hosted_anchor(&self, code: &str, anchor_id: &str) -> Result<()> {
            self.inner.publish_hosted_anchor(code, anchor_id).await
        }

        async fn watch(&self, code: &str) -> Result<RoomWatch> {
            tokio::time::sleep(self.watch_delay).await;
            self.inner.watch(code).await
        }

        async fn unwatch(&self, id: WatchId) -> Result<()> {
            self.inner.unwatch(id).await
        }
    }

    #[tokio::test]
    async fn create_room_returns_sequential_codes() {
        let (rendezvous, _registry) = protocol();
        assert_eq!(rendezvous.create_room().await.unwrap(), "1");
        assert_eq!(rendezvous.create_room().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn create_room_eventually_writes_initial_record() {
        let (rendezvous, registry) = protocol();
        let code = rendezvous.create_room().await.unwrap();

        // The record write is spawned, so poll briefly.
        let mut record = None;
        for _ in 0..50 {
            record = registry.room(&code).await;
            if record.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let record = record.expect("initial record should land");
        assert_eq!(record.display_name, code);
        assert!(record.hosted_anchor_id.is_none());
        assert!(record.updated_at_timestamp > 0);
    }

    #[tokio::test]
    async fn create_room_fails_when_registry_offline() {
        let (rendezvous, registry) = protocol();
        registry.set_offline(true);
        assert!(matches!(
            rendezvous.create_room().await,
            Err(RendezvousError::RoomCreationFailed)
        ));
    }

    #[tokio::test]
    async fn watch_resolves_when_anchor_is_published() {
        let (rendezvous, registry) = protocol();
        registry
            .create_room("7", &RoomRecord::new("7", 1))
            .await
            .unwrap();

        let token = rendezvous.begin_watch("7").await;
        let watcher = rendezvous.clone();
        let task = tokio::spawn(async move { watcher.watch_for_hosted_anchor(token).await });

        // Give the watch time to install, then publish.
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry
            .publish_hosted_anchor("7", "cid-123")
            .await
            .unwrap();

        let anchor_id = task.await.unwrap().unwrap();
        assert_eq!(anchor_id, "cid-123");
        // Subscription torn down after the first hit.
        assert_eq!(registry.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn watch_ignores_records_without_anchor_id() {
        let (rendezvous, registry) = protocol();

        let token = rendezvous.begin_watch("7").await;
        let watcher = rendezvous.clone();
        let task = tokio::spawn(async move { watcher.watch_for_hosted_anchor(token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Creation-time change event: no hosted_anchor_id yet.
        registry
            .create_room("7", &RoomRecord::new("7", 1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        registry.publish_hosted_anchor("7", "cid-9").await.unwrap();
        assert_eq!(task.await.unwrap().unwrap(), "cid-9");
    }

    #[tokio::test]
    async fn stop_watching_cancels_pending_watch() {
        let (rendezvous, registry) = protocol();

        let token = rendezvous.begin_watch("4").await;
        let watcher = rendezvous.clone();
        let task = tokio::spawn(async move { watcher.watch_for_hosted_anchor(token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        rendezvous.stop_watching("4").await.unwrap();

        assert!(matches!(
            task.await.unwrap(),
            Err(RendezvousError::WatchCancelled)
        ));
        assert_eq!(registry.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn stop_watching_during_install_round_trip_cancels() {
        let inner = Arc::new(InMemoryRegistry::new());
        let registry = Arc::new(SlowWatchRegistry {
            inner: Arc::clone(&inner),
            watch_delay: Duration::from_millis(60),
        });
        let rendezvous = RendezvousProtocol::new(registry);

        let token = rendezvous.begin_watch("4").await;
        let watcher = rendezvous.clone();
        let task = tokio::spawn(async move { watcher.watch_for_hosted_anchor(token).await });

        // Cancel while the store round trip is still in flight.
        tokio::time::sleep(Duration::from_millis(10)).await;
        rendezvous.stop_watching("4").await.unwrap();

        // The install path observes the cancellation and removes the fresh
        // subscription before completing.
        assert!(matches!(
            task.await.unwrap(),
            Err(RendezvousError::WatchCancelled)
        ));
        assert_eq!(inner.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn stop_watching_before_wait_starts_cancels() {
        let (rendezvous, registry) = protocol();

        let token = rendezvous.begin_watch("4").await;
        rendezvous.stop_watching("4").await.unwrap();

        // The subscription is never installed at all.
        assert!(matches!(
            rendezvous.watch_for_hosted_anchor(token).await,
            Err(RendezvousError::WatchCancelled)
        ));
        assert_eq!(registry.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn stop_watching_other_code_is_a_no_op() {
        let (rendezvous, registry) = protocol();

        let token = rendezvous.begin_watch("4").await;
        let watcher = rendezvous.clone();
        let task = tokio::spawn(async move { watcher.watch_for_hosted_anchor(token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        rendezvous.stop_watching("5").await.unwrap();
        assert!(!task.is_finished());
        assert_eq!(registry.watcher_count().await, 1);

        rendezvous.stop_watching("4").await.unwrap();
        assert!(task.await.unwrap().is_err());
    }
}
