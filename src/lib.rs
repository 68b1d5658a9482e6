//! # Anchor Rendezvous
//!
//! Registry-agnostic Rust client for cloud-anchor session rendezvous between
//! AR clients.
//!
//! Two independent clients observing the same physical space can agree on a
//! shared anchor point: one client *hosts* a local anchor with an opaque
//! perception service and publishes the resulting cloud anchor id in a shared
//! registry under a short room code; the other client looks up the code,
//! waits for the id to appear, and *resolves* it against its own live
//! observation of the space.
//!
//! This crate provides that rendezvous layer and the session state machine
//! that drives it. AR tracking, rendering, and the cloud-anchor recognition
//! service itself are external collaborators behind the
//! [`PerceptionGateway`] trait; the shared store is behind the
//! [`RoomRegistry`] trait.
//!
//! ## Features
//!
//! - **Registry-agnostic** — implement the [`RoomRegistry`] trait for any
//!   shared store with an atomic counter and change notifications
//! - **Pure state machine** — [`Session::apply`] maps events to effects with
//!   no I/O, so every transition is unit-testable
//! - **Stale-callback suppression** — generation counters drop late
//!   completions from cancelled operations
//! - **In-memory registry built-in** — default `registry-memory` feature
//!   provides [`InMemoryRegistry`] for tests and single-process use
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let registry = Arc::new(InMemoryRegistry::new());
//! let (mut client, mut updates) =
//!     AnchorSessionClient::start(registry, my_gateway, SessionConfig::new());
//!
//! client.request_host()?;
//! while let Some(update) = updates.recv().await {
//!     match update.state {
//!         SessionState::RoomReady => client.tap(Transform::IDENTITY)?,
//!         SessionState::HostingDone => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod outcome;
pub mod perception;
pub mod protocol;
pub mod registries;
pub mod registry;
pub mod rendezvous;
pub mod session;

// Re-export primary types for ergonomic imports.
pub use client::{AnchorSessionClient, SessionConfig, SessionUpdate};
pub use error::RendezvousError;
pub use outcome::CloudAnchorState;
pub use perception::{
    CloudAnchor, HostOutcome, LocalAnchor, PerceptionGateway, ResolveOutcome, Transform,
};
pub use protocol::RoomRecord;
#[cfg(feature = "registry-memory")]
pub use registries::InMemoryRegistry;
pub use registry::{RoomRegistry, RoomWatch, WatchId};
pub use rendezvous::{RendezvousProtocol, WatchToken};
pub use session::{Effect, Session, SessionEvent, SessionState};
