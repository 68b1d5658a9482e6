//! Error types for the anchor rendezvous client.

use thiserror::Error;

/// Errors that can occur when using the rendezvous client.
///
/// Perception-gateway failures are deliberately *not* represented here: the
/// gateway reports a terminal [`CloudAnchorState`](crate::CloudAnchorState)
/// on the same channel as success, and the session converts it into display
/// text instead of raising an error.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// The shared registry could not commit an operation (store unreachable,
    /// transaction aborted after the store's internal retries ran out).
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Allocating a room code failed; the session returns to idle.
    #[error("room creation failed")]
    RoomCreationFailed,

    /// A pending watch was torn down before a hosted anchor id appeared.
    /// Treated as cancellation by the session loop, never surfaced to the user.
    #[error("watch cancelled")]
    WatchCancelled,

    /// The session loop has shut down; the handle can no longer accept events.
    #[error("session closed")]
    SessionClosed,

    /// Failed to serialize or deserialize a registry record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized [`Result`] type for rendezvous operations.
pub type Result<T> = std::result::Result<T, RendezvousError>;
