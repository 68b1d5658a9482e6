//! Registry implementations.
//!
//! This module provides concrete [`RoomRegistry`](crate::RoomRegistry)
//! implementations behind feature gates:
//!
//! | Feature           | Registry             |
//! |-------------------|----------------------|
//! | `registry-memory` | [`InMemoryRegistry`] |
//!
//! Remote stores (a realtime database, a coordination service) are expected
//! to be implemented as external adapter crates against the trait.

#[cfg(feature = "registry-memory")]
pub mod memory;

#[cfg(feature = "registry-memory")]
pub use memory::InMemoryRegistry;
