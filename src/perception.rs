//! Perception gateway boundary.
//!
//! The [`PerceptionGateway`] trait is the seam between this crate and the
//! AR tracking / cloud anchor subsystem. The core only issues "host this
//! local anchor" and "resolve this identifier" requests; everything else —
//! sensor frames, feature mapping, the recognition algorithm — lives behind
//! the trait.
//!
//! Failures are not errors here: both operations settle with a terminal
//! [`CloudAnchorState`] on the same channel as success, and the session
//! turns it into display text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::CloudAnchorState;
use crate::protocol::CloudAnchorId;

/// Column-major 4x4 pose matrix for a point in tracked space.
///
/// Opaque to the rendezvous core; it is only carried between the tap event
/// and the gateway, and back from a successful resolve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [[f32; 4]; 4]);

impl Transform {
    /// The identity pose.
    pub const IDENTITY: Transform = Transform([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// A pure translation, convenient for tests.
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.0[3] = [x, y, z, 1.0];
        m
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Handle to a locally tracked anchor, owned exclusively by the session.
///
/// Created when the user taps a surface point (submitted for hosting) or
/// from the transform of a successfully resolved cloud anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAnchor {
    /// Process-local identity of the anchor.
    pub id: Uuid,
    /// Pose of the anchor in the local tracking frame.
    pub transform: Transform,
}

impl LocalAnchor {
    /// Create a new local anchor at the given pose.
    pub fn new(transform: Transform) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform,
        }
    }
}

/// The session's record of an in-flight or settled cloud anchor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAnchor {
    /// Cloud anchor id, once known (immediately for resolving, on success
    /// for hosting).
    pub cloud_anchor_id: Option<CloudAnchorId>,
    /// Latest reported state. Starts at
    /// [`TaskInProgress`](CloudAnchorState::TaskInProgress) and settles once.
    pub state: CloudAnchorState,
}

impl CloudAnchor {
    /// An operation that has been issued but not yet settled.
    pub fn pending(cloud_anchor_id: Option<CloudAnchorId>) -> Self {
        Self {
            cloud_anchor_id,
            state: CloudAnchorState::TaskInProgress,
        }
    }
}

/// Terminal outcome of a host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    /// Final state reported by the service.
    pub state: CloudAnchorState,
    /// Cloud anchor id, present iff the state is a success.
    pub cloud_anchor_id: Option<CloudAnchorId>,
}

impl HostOutcome {
    /// A successful host carrying the id other clients can resolve.
    pub fn success(cloud_anchor_id: impl Into<CloudAnchorId>) -> Self {
        Self {
            state: CloudAnchorState::Success,
            cloud_anchor_id: Some(cloud_anchor_id.into()),
        }
    }

    /// A failed host with the given terminal state.
    pub fn failure(state: CloudAnchorState) -> Self {
        Self {
            state,
            cloud_anchor_id: None,
        }
    }
}

/// Terminal outcome of a resolve operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOutcome {
    /// Final state reported by the service.
    pub state: CloudAnchorState,
    /// Pose of the resolved anchor in the local tracking frame, present iff
    /// the state is a success.
    pub transform: Option<Transform>,
}

impl ResolveOutcome {
    /// A successful resolve carrying the anchor's local pose.
    pub fn success(transform: Transform) -> Self {
        Self {
            state: CloudAnchorState::Success,
            transform: Some(transform),
        }
    }

    /// A failed resolve with the given terminal state.
    pub fn failure(state: CloudAnchorState) -> Self {
        Self {
            state,
            transform: None,
        }
    }
}

/// Asynchronous host/resolve operations against the cloud anchor service.
///
/// Both methods are issued from the session loop via `tokio::spawn`, so
/// implementations may take arbitrarily long; the session suppresses
/// outcomes that arrive after the operation was cancelled.
///
/// # Object Safety
///
/// This trait is object-safe; `Arc<dyn PerceptionGateway>` works for dynamic
/// dispatch, though `AnchorSessionClient::start` takes `impl PerceptionGateway`
/// for the common case.
#[async_trait]
pub trait PerceptionGateway: Send + Sync + 'static {
    /// Host a locally tracked anchor so other clients can resolve it.
    ///
    /// Resolves with a terminal [`HostOutcome`]; failures are outcome states,
    /// never errors.
    async fn host(&self, anchor: LocalAnchor) -> HostOutcome;

    /// Resolve a previously hosted anchor by its cloud anchor id.
    ///
    /// Resolves with a terminal [`ResolveOutcome`]; failures are outcome
    /// states, never errors.
    async fn resolve(&self, cloud_anchor_id: &str) -> ResolveOutcome;
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

    #[test]
    fn host_outcome_success_carries_id() {
        let outcome = HostOutcome::success("cid-abc");
        assert!(outcome.state.is_success());
        assert_eq!(outcome.cloud_anchor_id.as_deref(), Some("cid-abc"));
    }

    #[test]
    fn resolve_outcome_failure_has_no_transform() {
        let outcome = ResolveOutcome::failure(CloudAnchorState::ErrorCloudIdNotFound);
        assert!(!outcome.state.is_success());
        assert!(outcome.transform.is_none());
    }

    #[test]
    fn local_anchors_have_distinct_identities() {
        let a = LocalAnchor::new(Transform::IDENTITY);
        let b = LocalAnchor::new(Transform::IDENTITY);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn translation_sets_last_column() {
        let t = Transform::translation(1.0, 2.0, 3.0);
        assert_eq!(t.0[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
