#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for anchor rendezvous integration tests.
//!
//! Provides a gate-controlled [`ScriptedGateway`] so tests can decide exactly
//! when a host or resolve call completes, plus an update-stream helper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anchor_rendezvous::error::Result;
use anchor_rendezvous::{
    HostOutcome, InMemoryRegistry, LocalAnchor, PerceptionGateway, ResolveOutcome, RoomRecord,
    RoomRegistry, RoomWatch, SessionState, SessionUpdate, Transform, WatchId,
};
use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

// ── ScriptedGateway ─────────────────────────────────────────────────

/// A perception gateway whose calls block until the test releases them.
///
/// Each `host` call waits for one permit on `host_gate` before returning the
/// configured outcome, and likewise for `resolve`. Constructing the gateway
/// with pre-added permits makes calls complete immediately.
pub struct ScriptedGateway {
    host_outcome: StdMutex<HostOutcome>,
    resolve_outcome: StdMutex<ResolveOutcome>,
    /// Permits released by the test to let a pending `host` finish.
    pub host_gate: Arc<Semaphore>,
    /// Permits released by the test to let a pending `resolve` finish.
    pub resolve_gate: Arc<Semaphore>,
    /// Anchors passed to `host`, in call order.
    pub hosted: Arc<StdMutex<Vec<LocalAnchor>>>,
    /// Cloud anchor ids passed to `resolve`, in call order.
    pub resolved_ids: Arc<StdMutex<Vec<String>>>,
    /// Total number of `resolve` calls, including ones still gated.
    pub resolve_calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    /// Gateway whose calls complete immediately with successful outcomes.
    pub fn open() -> Self {
        let gateway = Self::gated();
        gateway.host_gate.add_permits(Semaphore::MAX_PERMITS);
        gateway.resolve_gate.add_permits(Semaphore::MAX_PERMITS);
        gateway
    }

    /// Gateway whose calls block until the test adds permits.
    pub fn gated() -> Self {
        Self {
            host_outcome: StdMutex::new(HostOutcome::success("cid-scripted")),
            resolve_outcome: StdMutex::new(ResolveOutcome::success(Transform::IDENTITY)),
            host_gate: Arc::new(Semaphore::new(0)),
            resolve_gate: Arc::new(Semaphore::new(0)),
            hosted: Arc::new(StdMutex::new(Vec::new())),
            resolved_ids: Arc::new(StdMutex::new(Vec::new())),
            resolve_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_host_outcome(&self, outcome: HostOutcome) {
        *self.host_outcome.lock().unwrap() = outcome;
    }

    pub fn set_resolve_outcome(&self, outcome: ResolveOutcome) {
        *self.resolve_outcome.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl PerceptionGateway for ScriptedGateway {
    async fn host(&self, anchor: LocalAnchor) -> HostOutcome {
        self.hosted.lock().unwrap().push(anchor);
        let permit = self.host_gate.acquire().await.expect("gate closed");
        permit.forget();
        self.host_outcome.lock().unwrap().clone()
    }

    async fn resolve(&self, cloud_anchor_id: &str) -> ResolveOutcome {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.resolved_ids
            .lock()
            .unwrap()
            .push(cloud_anchor_id.to_owned());
        let permit = self.resolve_gate.acquire().await.expect("gate closed");
        permit.forget();
        *self.resolve_outcome.lock().unwrap()
    }
}

// ── SlowWatchRegistry ───────────────────────────────────────────────

/// Registry wrapper whose `watch` takes a store round trip's worth of time,
/// for exercising cancellations that race the watch installation.
pub struct SlowWatchRegistry {
    inner: Arc<InMemoryRegistry>,
    watch_delay: Duration,
}

impl SlowWatchRegistry {
    pub fn new(inner: Arc<InMemoryRegistry>, watch_delay: Duration) -> Self {
        Self { inner, watch_delay }
    }
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

// ── Update-stream helpers ───────────────────────────────────────────

/// Receive updates until one with the given state arrives, or panic after
/// two seconds.
pub async fn wait_for_state(
    updates: &mut mpsc::Receiver<SessionUpdate>,
    state: SessionState,
) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let update = updates.recv().await.expect("update channel closed");
            if update.state == state {
                return update;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
}

/// Drain updates for a short window and assert none of them carries the
/// given state.
pub async fn assert_state_never_reached(
    updates: &mut mpsc::Receiver<SessionUpdate>,
    state: SessionState,
) {
    let deadline = tokio::time::sleep(Duration::from_millis(150));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            update = updates.recv() => {
                if let Some(update) = update {
                    assert_ne!(update.state, state, "unexpected transition to {state:?}");
                } else {
                    return;
                }
            }
            () = &mut deadline => return,
        }
    }
}
