//! Room registry abstraction.
//!
//! The [`RoomRegistry`] trait models a shared, multi-reader/multi-writer
//! key-value store with an atomic counter and change notification ("watch")
//! semantics — the rendezvous point where the hosting client publishes a
//! cloud anchor id and the resolving client observes it.
//!
//! # Connection Setup
//!
//! Connection setup is intentionally NOT part of this trait — different
//! stores have fundamentally different parameters (database URLs, auth
//! tokens, local paths). Construct a connected registry externally, then
//! hand it to `AnchorSessionClient::start` or `RendezvousProtocol::new`.
//!
//! # Watch Semantics
//!
//! [`watch`](RoomRegistry::watch) delivers the record's current value first
//! (when one exists) and then every subsequent change, **at least once** —
//! duplicate notifications for the same logical value must be tolerated by
//! the consumer. [`unwatch`](RoomRegistry::unwatch) guarantees that no
//! further notification is delivered once it returns.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::RoomRecord;

/// Identifier of an active watch subscription.
pub type WatchId = Uuid;

/// An active change subscription on a single room record.
///
/// Dropping the receiver alone does not release registry-side resources;
/// cancel via [`RoomRegistry::unwatch`] with [`RoomWatch::id`].
#[derive(Debug)]
pub struct RoomWatch {
    /// Handle used to cancel the subscription.
    pub id: WatchId,
    /// Change notifications, starting with the record's current value when
    /// one exists. Closed when the subscription is torn down.
    pub updates: mpsc::UnboundedReceiver<RoomRecord>,
}

/// A shared store for room records with a linearizable room-code counter.
///
/// Multiple independent client processes call
/// [`allocate_next_code`](RoomRegistry::allocate_next_code) concurrently;
/// the store's own concurrency control must guarantee that no two callers
/// ever observe or commit the same incremented value.
#[async_trait]
pub trait RoomRegistry: Send + Sync + 'static {
    /// Atomically increment the shared room counter and return the new value
    /// formatted as a decimal string.
    ///
    /// A missing or non-integer counter value is treated as 0. Internal
    /// retries of the read-modify-write cycle are the registry's own
    /// responsibility and transparent to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::RegistryUnavailable`](crate::RendezvousError::RegistryUnavailable)
    /// if the transaction cannot be committed at all.
    async fn allocate_next_code(&self) -> Result<String>;

    /// Unconditionally write a room's initial record under `code`.
    async fn create_room(&self, code: &str, record: &RoomRecord) -> Result<()>;

    /// Write `hosted_anchor_id` under `code` and refresh the record's
    /// `updated_at_timestamp`. Idempotent when retried with the same value.
    async fn publish_hosted_anchor(&self, code: &str, anchor_id: &str) -> Result<()>;

    /// Subscribe to changes of the record at `code`.
    ///
    /// The current value is delivered first when a record exists. Delivery
    /// order per subscription follows the store's update order; there is no
    /// ordering guarantee across different codes.
    async fn watch(&self, code: &str) -> Result<RoomWatch>;

    /// Cancel a subscription. No further notifications are delivered once
    /// this returns. Unknown ids are a no-op.
    async fn unwatch(&self, id: WatchId) -> Result<()>;
}

// Lets multiple clients share one registry instance without a newtype.
#[async_trait]
impl<R: RoomRegistry> RoomRegistry for std::sync::Arc<R> {
    async fn allocate_next_code(&self) -> Result<String> {
        (**self).allocate_next_code().await
    }

    async fn create_room(&self, code: &str, record: &RoomRecord) -> Result<()> {
        (**self).create_room(code, record).await
    }

    async fn publish_hosted_anchor(&self, code: &str, anchor_id: &str) -> Result<()> {
        (**self).publish_hosted_anchor(code, anchor_id).await
    }

    async fn watch(&self, code: &str) -> Result<RoomWatch> {
        (**self).watch(code).await
    }

    async fn unwatch(&self, id: WatchId) -> Result<()> {
        (**self).unwatch(id).await
    }
}
