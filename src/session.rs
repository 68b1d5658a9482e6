//! The session state machine.
//!
//! [`Session`] is the single authoritative state per client instance.
//! [`Session::apply`] is pure of I/O: it takes an event, mutates the session
//! value, and returns the [`Effect`]s the driver must perform (registry and
//! gateway calls). The client's background loop executes those effects and
//! feeds their completions back in as further events.
//!
//! # Stale-callback suppression
//!
//! Every asynchronous completion event carries the generation counter it was
//! issued under. The generation bumps whenever a new operation starts and on
//! every reset to idle, so a late completion from a cancelled or superseded
//! operation no longer matches and is dropped without any visible state
//! change. This is the sole cancellation mechanism: in-flight network
//! operations are never hard-cancelled, their results are suppressed at
//! delivery time.

use tracing::{debug, warn};

use crate::perception::{CloudAnchor, HostOutcome, LocalAnchor, ResolveOutcome, Transform};
use crate::protocol::CloudAnchorId;

const IDLE_MESSAGE: &str = "Tap HOST or RESOLVE to begin.";
const CREATE_FAILED_MESSAGE: &str = "Failed to create room. Tap HOST or RESOLVE to begin.";

/// States of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session activity; room code and anchor handles are empty.
    Idle,
    /// Waiting for the registry to allocate a room code.
    CreatingRoom,
    /// Room allocated; waiting for the user to pick a surface point.
    RoomReady,
    /// A local anchor has been submitted for hosting.
    Hosting,
    /// Hosting settled (success or failure); terminal until cancel.
    HostingDone,
    /// Waiting for the user to enter a room code.
    AwaitingRoomCode,
    /// Watching the room record and/or resolving the hosted anchor.
    Resolving,
    /// Resolving settled (success or failure); terminal until cancel.
    ResolvingDone,
}

/// Events processed by the session state machine.
///
/// The first five come from the presentation layer; the rest are completions
/// of effects, tagged with the generation they were issued under.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The user asked to host an anchor.
    HostRequested,
    /// The user asked to resolve someone else's anchor.
    ResolveRequested,
    /// The user submitted a room code (possibly empty, which cancels).
    RoomCodeSubmitted { room_code: String },
    /// The user cancelled whatever is in progress.
    CancelRequested,
    /// The user selected a surface point in tracked space.
    SurfaceTapped { transform: Transform },

    /// Room allocation committed.
    RoomCreated { generation: u64, room_code: String },
    /// Room allocation failed.
    RoomCreationFailed { generation: u64 },
    /// The watched room record now carries a hosted anchor id.
    HostedAnchorAvailable {
        generation: u64,
        cloud_anchor_id: CloudAnchorId,
    },
    /// The perception gateway settled a host operation.
    HostFinished {
        generation: u64,
        outcome: HostOutcome,
    },
    /// The perception gateway settled a resolve operation.
    ResolveFinished {
        generation: u64,
        outcome: ResolveOutcome,
    },
}

/// Side effects requested by a transition, performed by the driver loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Allocate a room code and write the initial record.
    CreateRoom,
    /// Watch the room record until a hosted anchor id appears.
    WatchRoom { room_code: String },
    /// Tear down the watch subscription for the room.
    StopWatching { room_code: String },
    /// Host the local anchor with the perception gateway.
    HostAnchor { anchor: LocalAnchor },
    /// Resolve a hosted anchor by its cloud anchor id.
    ResolveAnchor { cloud_anchor_id: CloudAnchorId },
    /// Publish the hosted anchor id under the session's room code.
    PublishHostedAnchor {
        room_code: String,
        cloud_anchor_id: CloudAnchorId,
    },
}

/// The per-client session value.
///
/// Lives for the process lifetime; returning to [`SessionState::Idle`]
/// clears the room code, drops both anchor handles, and bumps the
/// generation so stale completions are suppressed.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    room_code: String,
    message: String,
    generation: u64,
    local_anchor: Option<LocalAnchor>,
    cloud_anchor: Option<CloudAnchor>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh idle session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            room_code: String::new(),
            message: IDLE_MESSAGE.to_owned(),
            generation: 0,
            local_anchor: None,
            cloud_anchor: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current room code; empty when no session is active.
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Display message for the presentation layer.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Generation under which the next completion must arrive to be applied.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The locally tracked anchor, when one is held.
    pub fn local_anchor(&self) -> Option<&LocalAnchor> {
        self.local_anchor.as_ref()
    }

    /// The in-flight or settled cloud operation, when one is held.
    pub fn cloud_anchor(&self) -> Option<&CloudAnchor> {
        self.cloud_anchor.as_ref()
    }

    /// Apply one event, returning the effects the driver must perform.
    ///
    /// Events that do not fit the current state, and completions whose
    /// generation no longer matches, are dropped without any state change.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::HostRequested => {
                if self.state != SessionState::Idle {
                    return self.drop_event("HostRequested");
                }
                self.generation += 1;
                self.state = SessionState::CreatingRoom;
                self.message = "Creating room...".to_owned();
                vec![Effect::CreateRoom]
            }

            SessionEvent::ResolveRequested => {
                if self.state != SessionState::Idle {
                    return self.drop_event("ResolveRequested");
                }
                self.state = SessionState::AwaitingRoomCode;
                self.message = "Enter a room code to resolve.".to_owned();
                vec![]
            }

            SessionEvent::RoomCodeSubmitted { room_code } => {
                if self.state != SessionState::AwaitingRoomCode {
                    return self.drop_event("RoomCodeSubmitted");
                }
                if room_code.is_empty() {
                    self.reset(IDLE_MESSAGE);
                    return vec![];
                }
                self.generation += 1;
                self.room_code = room_code.clone();
                self.state = SessionState::Resolving;
                self.message = "Resolving anchor...".to_owned();
                vec![Effect::WatchRoom { room_code }]
            }

            SessionEvent::SurfaceTapped { transform } => {
                if self.state != SessionState::RoomReady {
                    return self.drop_event("SurfaceTapped");
                }
                self.generation += 1;
                let anchor = LocalAnchor::new(transform);
                self.local_anchor = Some(anchor);
                self.cloud_anchor = Some(CloudAnchor::pending(None));
                self.state = SessionState::Hosting;
                self.message = "Hosting anchor...".to_owned();
                vec![Effect::HostAnchor { anchor }]
            }

            SessionEvent::CancelRequested => {
                // The watch subscription is the one resource needing explicit
                // teardown on the way out.
                let effects = if self.state == SessionState::Resolving
                    && !self.room_code.is_empty()
                {
                    vec![Effect::StopWatching {
                        room_code: self.room_code.clone(),
                    }]
                } else {
                    vec![]
                };
                self.reset(IDLE_MESSAGE);
                effects
            }

            SessionEvent::RoomCreated {
                generation,
                room_code,
            } => {
                if self.state != SessionState::CreatingRoom || !self.is_current(generation) {
                    return self.drop_event("RoomCreated");
                }
                self.room_code = room_code;
                self.state = SessionState::RoomReady;
                self.message = "Tap on a plane to create anchor and host.".to_owned();
                vec![]
            }

            SessionEvent::RoomCreationFailed { generation } => {
                if self.state != SessionState::CreatingRoom || !self.is_current(generation) {
                    return self.drop_event("RoomCreationFailed");
                }
                self.reset(CREATE_FAILED_MESSAGE);
                vec![]
            }

            SessionEvent::HostedAnchorAvailable {
                generation,
                cloud_anchor_id,
            } => {
                if self.state != SessionState::Resolving || !self.is_current(generation) {
                    return self.drop_event("HostedAnchorAvailable");
                }
                // Internal transition: stay in Resolving, hand the id to the
                // gateway. The rendezvous layer already tore down the watch.
                self.cloud_anchor = Some(CloudAnchor::pending(Some(cloud_anchor_id.clone())));
                vec![Effect::ResolveAnchor { cloud_anchor_id }]
            }

            SessionEvent::HostFinished {
                generation,
                outcome,
            } => {
                if self.state != SessionState::Hosting || !self.is_current(generation) {
                    return self.drop_event("HostFinished");
                }
                self.cloud_anchor = Some(CloudAnchor {
                    cloud_anchor_id: outcome.cloud_anchor_id.clone(),
                    state: outcome.state,
                });
                self.state = SessionState::HostingDone;
                self.message = format!("Finished hosting: {}", outcome.state.description());
                if !outcome.state.is_success() {
                    return vec![];
                }
                match outcome.cloud_anchor_id {
                    Some(cloud_anchor_id) => vec![Effect::PublishHostedAnchor {
                        room_code: self.room_code.clone(),
                        cloud_anchor_id,
                    }],
                    None => {
                        warn!("host succeeded without a cloud anchor id; nothing to publish");
                        vec![]
                    }
                }
            }

            SessionEvent::ResolveFinished {
                generation,
                outcome,
            } => {
                if self.state != SessionState::Resolving || !self.is_current(generation) {
                    return self.drop_event("ResolveFinished");
                }
                match self.cloud_anchor.as_mut() {
                    Some(cloud_anchor) => cloud_anchor.state = outcome.state,
                    None => {
                        self.cloud_anchor = Some(CloudAnchor {
                            cloud_anchor_id: None,
                            state: outcome.state,
                        });
                    }
                }
                if outcome.state.is_success() {
                    if let Some(transform) = outcome.transform {
                        self.local_anchor = Some(LocalAnchor::new(transform));
                    }
                }
                self.state = SessionState::ResolvingDone;
                self.message = format!("Finished resolving: {}", outcome.state.description());
                vec![]
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    fn drop_event(&self, event: &str) -> Vec<Effect> {
        debug!(
            state = ?self.state,
            generation = self.generation,
            "dropping {event}: stale or not expected in this state"
        );
        vec![]
    }

    /// Return to idle: clear the room code, drop both anchor handles, and
    /// bump the generation so in-flight completions are suppressed.
    fn reset(&mut self, message: &str) {
        self.generation += 1;
        self.state = SessionState::Idle;
        self.room_code.clear();
        self.local_anchor = None;
        self.cloud_anchor = None;
        self.message = message.to_owned();
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
    use crate::outcome::CloudAnchorState;

    /// Drive a fresh session into `RoomReady` with room code "1".
    fn room_ready_session() -> Session {
        let mut session = Session::new();
        assert_eq!(
            session.apply(SessionEvent::HostRequested),
            vec![Effect::CreateRoom]
        );
        let generation = session.generation();
        session.apply(SessionEvent::RoomCreated {
            generation,
            room_code: "1".into(),
        });
        assert_eq!(session.state(), SessionState::RoomReady);
        session
    }

    /// Drive a fresh session into `Resolving` on room code "7".
    fn resolving_session() -> Session {
        let mut session = Session::new();
        session.apply(SessionEvent::ResolveRequested);
        let effects = session.apply(SessionEvent::RoomCodeSubmitted {
            room_code: "7".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::WatchRoom {
                room_code: "7".into()
            }]
        );
        session
    }

    #[test]
    fn new_session_is_idle_with_prompt() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.room_code(), "");
        assert_eq!(session.message(), "Tap HOST or RESOLVE to begin.");
        assert!(session.local_anchor().is_none());
        assert!(session.cloud_anchor().is_none());
    }

    #[test]
    fn host_request_starts_room_creation() {
        let mut session = Session::new();
        let effects = session.apply(SessionEvent::HostRequested);
        assert_eq!(effects, vec![Effect::CreateRoom]);
        assert_eq!(session.state(), SessionState::CreatingRoom);
        assert_eq!(session.message(), "Creating room...");
    }

    #[test]
    fn host_request_ignored_outside_idle() {
        let mut session = room_ready_session();
        assert!(session.apply(SessionEvent::HostRequested).is_empty());
        assert_eq!(session.state(), SessionState::RoomReady);
    }

    #[test]
    fn room_created_moves_to_room_ready() {
        let session = room_ready_session();
        assert_eq!(session.room_code(), "1");
        assert_eq!(session.message(), "Tap on a plane to create anchor and host.");
    }

    #[test]
    fn room_creation_failure_returns_to_idle_with_failure_message() {
        let mut session = Session::new();
        session.apply(SessionEvent::HostRequested);
        let generation = session.generation();
        session.apply(SessionEvent::RoomCreationFailed { generation });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.message(),
            "Failed to create room. Tap HOST or RESOLVE to begin."
        );
        assert_eq!(session.room_code(), "");
    }

    #[test]
    fn stale_room_created_is_dropped_after_cancel() {
        let mut session = Session::new();
        session.apply(SessionEvent::HostRequested);
        let stale_generation = session.generation();
        session.apply(SessionEvent::CancelRequested);

        let effects = session.apply(SessionEvent::RoomCreated {
            generation: stale_generation,
            room_code: "9".into(),
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.room_code(), "");
    }

    #[test]
    fn tap_in_room_ready_starts_hosting() {
        let mut session = room_ready_session();
        let effects = session.apply(SessionEvent::SurfaceTapped {
            transform: Transform::translation(1.0, 0.0, 0.0),
        });
        assert_eq!(session.state(), SessionState::Hosting);
        assert_eq!(session.message(), "Hosting anchor...");
        let anchor = *session.local_anchor().unwrap();
        assert_eq!(effects, vec![Effect::HostAnchor { anchor }]);
        assert_eq!(
            session.cloud_anchor().unwrap().state,
            CloudAnchorState::TaskInProgress
        );
    }

    #[test]
    fn tap_ignored_outside_room_ready() {
        let mut session = Session::new();
        assert!(session
            .apply(SessionEvent::SurfaceTapped {
                transform: Transform::IDENTITY,
            })
            .is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.local_anchor().is_none());
    }

    #[test]
    fn host_success_publishes_anchor_under_room_code() {
        let mut session = room_ready_session();
        session.apply(SessionEvent::SurfaceTapped {
            transform: Transform::IDENTITY,
        });
        let generation = session.generation();
        let effects = session.apply(SessionEvent::HostFinished {
            generation,
            outcome: HostOutcome::success("cid-abc"),
        });
        assert_eq!(session.state(), SessionState::HostingDone);
        assert_eq!(
            effects,
            vec![Effect::PublishHostedAnchor {
                room_code: "1".into(),
                cloud_anchor_id: "cid-abc".into(),
            }]
        );
        let cloud_anchor = session.cloud_anchor().unwrap();
        assert_eq!(cloud_anchor.cloud_anchor_id.as_deref(), Some("cid-abc"));
        assert!(cloud_anchor.state.is_success());
        assert!(session.message().starts_with("Finished hosting:"));
    }

    #[test]
    fn host_failure_reaches_hosting_done_without_publish() {
        let mut session = room_ready_session();
        session.apply(SessionEvent::SurfaceTapped {
            transform: Transform::IDENTITY,
        });
        let generation = session.generation();
        let effects = session.apply(SessionEvent::HostFinished {
            generation,
            outcome: HostOutcome::failure(CloudAnchorState::ErrorHostingDatasetProcessingFailed),
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::HostingDone);
        assert!(session.message().contains("could not process"));
    }

    #[test]
    fn stale_host_outcome_is_dropped() {
        let mut session = room_ready_session();
        session.apply(SessionEvent::SurfaceTapped {
            transform: Transform::IDENTITY,
        });
        let stale_generation = session.generation();
        session.apply(SessionEvent::CancelRequested);

        let effects = session.apply(SessionEvent::HostFinished {
            generation: stale_generation,
            outcome: HostOutcome::success("cid-late"),
        });
        assert!(effects.is_empty(), "no publish for a cancelled host");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.cloud_anchor().is_none());
    }

    #[test]
    fn resolve_request_awaits_room_code() {
        let mut session = Session::new();
        assert!(session.apply(SessionEvent::ResolveRequested).is_empty());
        assert_eq!(session.state(), SessionState::AwaitingRoomCode);
    }

    #[test]
    fn empty_room_code_cancels_back_to_idle() {
        let mut session = Session::new();
        session.apply(SessionEvent::ResolveRequested);
        let effects = session.apply(SessionEvent::RoomCodeSubmitted {
            room_code: String::new(),
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.message(), "Tap HOST or RESOLVE to begin.");
    }

    #[test]
    fn code_submission_starts_watching() {
        let session = resolving_session();
        assert_eq!(session.state(), SessionState::Resolving);
        assert_eq!(session.room_code(), "7");
        assert_eq!(session.message(), "Resolving anchor...");
    }

    #[test]
    fn hosted_anchor_available_triggers_resolve_effect() {
        let mut session = resolving_session();
        let generation = session.generation();
        let effects = session.apply(SessionEvent::HostedAnchorAvailable {
            generation,
            cloud_anchor_id: "cid-abc".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::ResolveAnchor {
                cloud_anchor_id: "cid-abc".into()
            }]
        );
        // Internal transition: still resolving.
        assert_eq!(session.state(), SessionState::Resolving);
        assert_eq!(
            session.cloud_anchor().unwrap().cloud_anchor_id.as_deref(),
            Some("cid-abc")
        );
    }

    #[test]
    fn hosted_anchor_available_dropped_after_cancel() {
        let mut session = resolving_session();
        let stale_generation = session.generation();
        let effects = session.apply(SessionEvent::CancelRequested);
        assert_eq!(
            effects,
            vec![Effect::StopWatching {
                room_code: "7".into()
            }]
        );

        let effects = session.apply(SessionEvent::HostedAnchorAvailable {
            generation: stale_generation,
            cloud_anchor_id: "cid-abc".into(),
        });
        assert!(effects.is_empty(), "no resolve for a cancelled watch");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn resolve_success_creates_local_anchor_from_transform() {
        let mut session = resolving_session();
        let generation = session.generation();
        session.apply(SessionEvent::HostedAnchorAvailable {
            generation,
            cloud_anchor_id: "cid-abc".into(),
        });
        let effects = session.apply(SessionEvent::ResolveFinished {
            generation,
            outcome: ResolveOutcome::success(Transform::translation(0.0, 1.0, 0.0)),
        });
        assert!(effects.is_empty());
        assert_eq!(session.state(), SessionState::ResolvingDone);
        let anchor = session.local_anchor().unwrap();
        assert_eq!(anchor.transform, Transform::translation(0.0, 1.0, 0.0));
        assert!(session.cloud_anchor().unwrap().state.is_success());
    }

    #[test]
    fn resolve_failure_reaches_resolving_done_with_outcome_text() {
        let mut session = resolving_session();
        let generation = session.generation();
        session.apply(SessionEvent::ResolveFinished {
            generation,
            outcome: ResolveOutcome::failure(CloudAnchorState::ErrorResolvingLocalizationNoMatch),
        });
        assert_eq!(session.state(), SessionState::ResolvingDone);
        assert!(session.local_anchor().is_none());
        assert!(session.message().starts_with("Finished resolving:"));
    }

    #[test]
    fn cancel_from_resolving_stops_the_watch() {
        let mut session = resolving_session();
        let effects = session.apply(SessionEvent::CancelRequested);
        assert_eq!(
            effects,
            vec![Effect::StopWatching {
                room_code: "7".into()
            }]
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn cancel_is_idempotent_from_any_state() {
        let mut sessions = vec![
            Session::new(),
            room_ready_session(),
            resolving_session(),
        ];
        // Also from mid-host.
        let mut hosting = room_ready_session();
        hosting.apply(SessionEvent::SurfaceTapped {
            transform: Transform::IDENTITY,
        });
        sessions.push(hosting);

        for session in &mut sessions {
            session.apply(SessionEvent::CancelRequested);
            session.apply(SessionEvent::CancelRequested);
            assert_eq!(session.state(), SessionState::Idle);
            assert_eq!(session.room_code(), "");
            assert!(session.local_anchor().is_none());
            assert!(session.cloud_anchor().is_none());
        }
    }

    #[test]
    fn generation_bumps_on_each_operation_and_reset() {
        let mut session = Session::new();
        let g0 = session.generation();
        session.apply(SessionEvent::HostRequested);
        let g1 = session.generation();
        assert!(g1 > g0);
        session.apply(SessionEvent::CancelRequested);
        assert!(session.generation() > g1);
    }
}
