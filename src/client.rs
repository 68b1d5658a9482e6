//! Async client driving the session state machine.
//!
//! [`AnchorSessionClient`] is a thin handle that communicates with a
//! background session loop task via an unbounded MPSC channel. The loop owns
//! the [`Session`] value, applies every event on one serialized execution
//! context, executes the resulting effects against the registry and the
//! perception gateway, and emits [`SessionUpdate`]s on a bounded channel
//! returned from [`AnchorSessionClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Arc::new(InMemoryRegistry::new());
//! let (client, mut updates) =
//!     AnchorSessionClient::start(registry, gateway, SessionConfig::new());
//!
//! client.request_host()?;
//! while let Some(update) = updates.recv().await {
//!     match update.state {
//!         SessionState::RoomReady => client.tap(tapped_transform)?,
//!         SessionState::HostingDone => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{RendezvousError, Result};
use crate::perception::{PerceptionGateway, Transform};
use crate::registry::RoomRegistry;
use crate::rendezvous::RendezvousProtocol;
use crate::session::{Effect, Session, SessionEvent, SessionState};

/// Default capacity of the bounded update channel.
const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for an [`AnchorSessionClient`].
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use anchor_rendezvous::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new()
///     .with_update_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.update_channel_capacity, 512);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the bounded update channel.
    ///
    /// When the consumer cannot keep up with session changes, updates are
    /// dropped (with a warning logged) to avoid blocking the session loop.
    /// Each update is a full snapshot, so a reader always converges on the
    /// latest state.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub update_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`AnchorSessionClient::shutdown`] is called, the session loop is
    /// given this much time to tear down any active watch and exit. If the
    /// timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            update_channel_capacity: DEFAULT_UPDATE_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded update channel.
    #[must_use]
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Session updates ─────────────────────────────────────────────────

/// Snapshot of the presentation-facing session state.
///
/// Emitted once when the loop starts and after every processed event.
/// Consecutive updates may be identical (events dropped as stale still emit
/// a snapshot); consumers must tolerate duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    /// Current state of the session state machine.
    pub state: SessionState,
    /// Current room code; empty when no session is active.
    pub room_code: String,
    /// Display message for the user.
    pub message: String,
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the session loop, for the
/// accessor methods.
struct SharedState {
    running: AtomicBool,
    state: Mutex<SessionState>,
    room_code: Mutex<String>,
    message: Mutex<String>,
}

impl SharedState {
    fn new(session: &Session) -> Self {
        Self {
            running: AtomicBool::new(true),
            state: Mutex::new(session.state()),
            room_code: Mutex::new(session.room_code().to_owned()),
            message: Mutex::new(session.message().to_owned()),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running anchor session.
///
/// Created via [`AnchorSessionClient::start`], which spawns the background
/// session loop and returns this handle together with an update receiver.
///
/// All public methods enqueue a session event and return immediately; the
/// transition happens on the loop's serialized context.
pub struct AnchorSessionClient {
    /// Sender half of the event channel into the session loop.
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Shared state updated by the session loop.
    shared: Arc<SharedState>,
    /// Handle to the background session loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the session loop to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl AnchorSessionClient {
    /// Start the session loop and return a handle plus update receiver.
    ///
    /// # Arguments
    ///
    /// * `registry` — The shared room registry (share one instance between
    ///   clients via `Arc`).
    /// * `gateway` — The perception subsystem performing host/resolve.
    /// * `config` — Channel capacity and shutdown tuning.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, update_receiver)`. The receiver yields a
    /// [`SessionUpdate`] snapshot for the initial idle state and after every
    /// processed event, until the client shuts down.
    #[must_use = "the update receiver must be used to observe session changes"]
    pub fn start(
        registry: impl RoomRegistry,
        gateway: impl PerceptionGateway,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.update_channel_capacity.max(1);
        let (update_tx, update_rx) = mpsc::channel::<SessionUpdate>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let session = Session::new();
        let shared = Arc::new(SharedState::new(&session));
        let loop_shared = Arc::clone(&shared);

        let rendezvous = RendezvousProtocol::new(Arc::new(registry));
        let gateway = Arc::new(gateway);

        let task = tokio::spawn(session_loop(
            session,
            rendezvous,
            gateway,
            event_rx,
            event_tx.clone(),
            update_tx,
            loop_shared,
            shutdown_rx,
        ));

        let client = Self {
            event_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, update_rx)
    }

    // ── Presentation-layer events ───────────────────────────────────

    /// The user asked to host an anchor: allocate a room code.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::SessionClosed`] if the loop has shut down.
    pub fn request_host(&self) -> Result<()> {
        self.send(SessionEvent::HostRequested)
    }

    /// The user asked to resolve someone else's anchor: prompt for a code.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::SessionClosed`] if the loop has shut down.
    pub fn request_resolve(&self) -> Result<()> {
        self.send(SessionEvent::ResolveRequested)
    }

    /// Submit the room code the user entered. An empty code cancels.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::SessionClosed`] if the loop has shut down.
    pub fn submit_room_code(&self, room_code: impl Into<String>) -> Result<()> {
        self.send(SessionEvent::RoomCodeSubmitted {
            room_code: room_code.into(),
        })
    }

    /// Cancel whatever is in progress and return to idle.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::SessionClosed`] if the loop has shut down.
    pub fn cancel(&self) -> Result<()> {
        self.send(SessionEvent::CancelRequested)
    }

    /// The user selected a surface point; host an anchor there.
    ///
    /// Only has an effect while the session is in
    /// [`SessionState::RoomReady`].
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::SessionClosed`] if the loop has shut down.
    pub fn tap(&self, transform: Transform) -> Result<()> {
        self.send(SessionEvent::SurfaceTapped { transform })
    }

    /// Shut down the client, stopping the background session loop.
    ///
    /// After calling this method, the update receiver will yield `None` once
    /// the loop exits, and further handle calls fail with
    /// [`RendezvousError::SessionClosed`].
    pub async fn shutdown(&mut self) {
        debug!("AnchorSessionClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the session loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the session loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current state of the session state machine.
    pub async fn current_state(&self) -> SessionState {
        *self.shared.state.lock().await
    }

    /// Current room code; empty when no session is active.
    pub async fn current_room_code(&self) -> String {
        self.shared.room_code.lock().await.clone()
    }

    /// Current display message.
    pub async fn current_message(&self) -> String {
        self.shared.message.lock().await.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `SessionEvent` to the session loop.
    fn send(&self, event: SessionEvent) -> Result<()> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(RendezvousError::SessionClosed);
        }
        self.event_tx
            .send(event)
            .map_err(|_| RendezvousError::SessionClosed)
    }
}

impl std::fmt::Debug for AnchorSessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorSessionClient")
            .field("running", &self.is_running())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for AnchorSessionClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown. The
        // only safe action is to abort the spawned task, which drops the
        // session loop future immediately.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Background loop that serializes all session events onto one context.
///
/// Exits when:
/// - The event channel closes (client handle dropped)
/// - The shutdown signal fires
#[allow(clippy::too_many_arguments)]
async fn session_loop<R: RoomRegistry, G: PerceptionGateway>(
    mut session: Session,
    rendezvous: RendezvousProtocol<R>,
    gateway: Arc<G>,
    mut event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    update_tx: mpsc::Sender<SessionUpdate>,
    shared: Arc<SharedState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("session loop started");

    // Initial snapshot so the presentation layer can render before any event.
    publish_update(&update_tx, &shared, &session).await;

    loop {
        tokio::select! {
            // Branch 1: next event (UI call or collaborator completion)
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        debug!("applying session event: {:?}", std::mem::discriminant(&event));
                        let effects = session.apply(event);
                        for effect in effects {
                            run_effect(effect, session.generation(), &rendezvous, &gateway, &event_tx).await;
                        }
                        publish_update(&update_tx, &shared, &session).await;
                    }
                    // Event channel closed — client handle dropped.
                    None => {
                        debug!("event channel closed, shutting down session loop");
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                break;
            }
        }
    }

    // Tear down any subscription left behind by an active resolve.
    if session.state() == SessionState::Resolving && !session.room_code().is_empty() {
        if let Err(e) = rendezvous.stop_watching(session.room_code()).await {
            debug!("watch teardown on shutdown failed: {e}");
        }
    }

    shared.running.store(false, Ordering::Release);
    debug!("session loop exited");
}

/// Execute one effect.
///
/// Registry and gateway calls are spawned so the loop never blocks on a
/// network round trip; their completions re-enter the loop as events tagged
/// with `generation`. `StopWatching` runs inline so the teardown is ordered
/// before the next event is processed.
async fn run_effect<R: RoomRegistry, G: PerceptionGateway>(
    effect: Effect,
    generation: u64,
    rendezvous: &RendezvousProtocol<R>,
    gateway: &Arc<G>,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
) {
    match effect {
        Effect::CreateRoom => {
            let rendezvous = rendezvous.clone();
            let tx = event_tx.clone();
            tokio::spawn(async move {
                let event = match rendezvous.create_room().await {
                    Ok(room_code) => SessionEvent::RoomCreated {
                        generation,
                        room_code,
                    },
                    Err(e) => {
                        warn!("room creation failed: {e}");
                        SessionEvent::RoomCreationFailed { generation }
                    }
                };
                let _ = tx.send(event);
            });
        }

        Effect::WatchRoom { room_code } => {
            // Register before spawning the wait, so a StopWatching processed
            // next on this loop always finds the pending subscription even
            // when the registry round trip has not completed yet.
            let token = rendezvous.begin_watch(&room_code).await;
            let rendezvous = rendezvous.clone();
            let tx = event_tx.clone();
            tokio::spawn(async move {
                match rendezvous.watch_for_hosted_anchor(token).await {
                    Ok(cloud_anchor_id) => {
                        let _ = tx.send(SessionEvent::HostedAnchorAvailable {
                            generation,
                            cloud_anchor_id,
                        });
                    }
                    Err(RendezvousError::WatchCancelled) => {
                        debug!(%room_code, "watch cancelled");
                    }
                    Err(e) => {
                        warn!(%room_code, "watch failed: {e}");
                    }
                }
            });
        }

        Effect::StopWatching { room_code } => {
            if let Err(e) = rendezvous.stop_watching(&room_code).await {
                debug!(%room_code, "stop watching failed: {e}");
            }
        }

        Effect::HostAnchor { anchor } => {
            let gateway = Arc::clone(gateway);
            let tx = event_tx.clone();
            tokio::spawn(async move {
                let outcome = gateway.host(anchor).await;
                let _ = tx.send(SessionEvent::HostFinished {
                    generation,
                    outcome,
                });
            });
        }

        Effect::ResolveAnchor { cloud_anchor_id } => {
            let gateway = Arc::clone(gateway);
            let tx = event_tx.clone();
            tokio::spawn(async move {
                let outcome = gateway.resolve(&cloud_anchor_id).await;
                let _ = tx.send(SessionEvent::ResolveFinished {
                    generation,
                    outcome,
                });
            });
        }

        Effect::PublishHostedAnchor {
            room_code,
            cloud_anchor_id,
        } => {
            // Best-effort, like the original's fire-and-forget record write.
            let rendezvous = rendezvous.clone();
            tokio::spawn(async move {
                if let Err(e) = rendezvous
                    .publish_hosted_anchor(&room_code, &cloud_anchor_id)
                    .await
                {
                    warn!(%room_code, "failed to publish hosted anchor id: {e}");
                }
            });
        }
    }
}

/// Mirror the session into the shared accessors and emit a snapshot.
///
/// If the update channel is full the snapshot is dropped with a warning;
/// a later snapshot supersedes it anyway.
async fn publish_update(
    update_tx: &mpsc::Sender<SessionUpdate>,
    shared: &SharedState,
    session: &Session,
) {
    *shared.state.lock().await = session.state();
    *shared.room_code.lock().await = session.room_code().to_owned();
    *shared.message.lock().await = session.message().to_owned();

    let update = SessionUpdate {
        state: session.state(),
        room_code: session.room_code().to_owned(),
        message: session.message().to_owned(),
    };
    match update_tx.try_send(update) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("update channel full, dropping snapshot for {:?}", dropped.state);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("update channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::outcome::CloudAnchorState;
    use crate::perception::{HostOutcome, LocalAnchor, ResolveOutcome};
    use crate::registries::InMemoryRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Gateway that answers every call with fixed outcomes.
    struct FixedGateway {
        host_outcome: HostOutcome,
        resolve_outcome: ResolveOutcome,
        hosted: Arc<StdMutex<Vec<LocalAnchor>>>,
    }

    impl FixedGateway {
        fn new(host_outcome: HostOutcome, resolve_outcome: ResolveOutcome) -> Self {
            Self {
                host_outcome,
                resolve_outcome,
                hosted: Arc::new(StdMutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PerceptionGateway for FixedGateway {
        async fn host(&self, anchor: LocalAnchor) -> HostOutcome {
            self.hosted.lock().unwrap().push(anchor);
            self.host_outcome.clone()
        }

        async fn resolve(&self, _cloud_anchor_id: &str) -> ResolveOutcome {
            self.resolve_outcome
        }
    }

    fn fixed_gateway() -> FixedGateway {
        FixedGateway::new(
            HostOutcome::success("cid-test"),
            ResolveOutcome::success(Transform::IDENTITY),
        )
    }

    async fn wait_for_state(
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

    #[tokio::test]
    async fn config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.update_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn update_channel_capacity_is_clamped_to_one() {
        let config = SessionConfig::new().with_update_channel_capacity(0);
        assert_eq!(config.update_channel_capacity, 1);
    }

    #[tokio::test]
    async fn initial_update_is_idle_snapshot() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, mut updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        let first = updates.recv().await.unwrap();
        assert_eq!(first.state, SessionState::Idle);
        assert_eq!(first.room_code, "");
        assert_eq!(first.message, "Tap HOST or RESOLVE to begin.");

        client.shutdown().await;
    }

    #[tokio::test]
    async fn host_flow_reaches_hosting_done_and_publishes() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, mut updates) = AnchorSessionClient::start(
            Arc::clone(&registry),
            fixed_gateway(),
            SessionConfig::new(),
        );

        client.request_host().unwrap();
        let update = wait_for_state(&mut updates, SessionState::RoomReady).await;
        assert_eq!(update.room_code, "1");

        client.tap(Transform::IDENTITY).unwrap();
        let update = wait_for_state(&mut updates, SessionState::HostingDone).await;
        assert!(update.message.starts_with("Finished hosting:"));

        // The publish is spawned; poll until it lands.
        let mut published = None;
        for _ in 0..100 {
            published = registry.room("1").await.and_then(|r| r.hosted_anchor_id);
            if published.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(published.as_deref(), Some("cid-test"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn accessors_follow_the_loop() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, mut updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        client.request_host().unwrap();
        wait_for_state(&mut updates, SessionState::RoomReady).await;

        assert_eq!(client.current_state().await, SessionState::RoomReady);
        assert_eq!(client.current_room_code().await, "1");
        assert_eq!(
            client.current_message().await,
            "Tap on a plane to create anchor and host."
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn session_closed_error_after_shutdown() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, _updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        client.shutdown().await;
        assert!(!client.is_running());
        assert!(matches!(
            client.request_host(),
            Err(RendezvousError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, _updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown_closes_updates() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (client, mut updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        let _ = updates.recv().await; // initial snapshot
        drop(client);

        // The loop task is aborted; the update channel closes eventually.
        while updates.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn resolve_failure_shows_outcome_text() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry
            .publish_hosted_anchor("3", "cid-gone")
            .await
            .unwrap();

        let gateway = FixedGateway::new(
            HostOutcome::success("unused"),
            ResolveOutcome::failure(CloudAnchorState::ErrorCloudIdNotFound),
        );
        let (mut client, mut updates) =
            AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

        client.request_resolve().unwrap();
        client.submit_room_code("3").unwrap();

        let update = wait_for_state(&mut updates, SessionState::ResolvingDone).await;
        assert!(update.message.starts_with("Finished resolving:"));
        assert!(update.message.contains("No hosted anchor exists"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (mut client, _updates) =
            AnchorSessionClient::start(registry, fixed_gateway(), SessionConfig::new());

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("AnchorSessionClient"));
        assert!(debug_str.contains("running"));

        client.shutdown().await;
    }
}
