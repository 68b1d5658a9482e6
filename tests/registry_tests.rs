#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Concurrency tests for the in-memory registry and the rendezvous layer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anchor_rendezvous::{InMemoryRegistry, RendezvousProtocol, RoomRecord, RoomRegistry};

#[tokio::test]
async fn concurrent_allocations_never_collide() {
    let registry = Arc::new(InMemoryRegistry::new());

    let mut tasks = Vec::new();
    for _ in 0..64 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.allocate_next_code().await.unwrap()
        }));
    }

    let mut codes = HashSet::new();
    for task in tasks {
        assert!(codes.insert(task.await.unwrap()), "duplicate room code");
    }
    assert_eq!(codes.len(), 64);
    // Codes are exactly 1..=64 in some order.
    for n in 1..=64u64 {
        assert!(codes.contains(&n.to_string()));
    }
}

#[tokio::test]
async fn concurrent_create_room_calls_get_distinct_codes() {
    let registry = Arc::new(InMemoryRegistry::new());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let rendezvous = RendezvousProtocol::new(Arc::clone(&registry));
        tasks.push(tokio::spawn(
            async move { rendezvous.create_room().await.unwrap() },
        ));
    }

    let mut codes = HashSet::new();
    for task in tasks {
        assert!(codes.insert(task.await.unwrap()));
    }
    assert_eq!(codes.len(), 16);
}

#[tokio::test]
async fn every_watcher_of_a_room_sees_the_publish() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry
        .create_room("3", &RoomRecord::new("3", 1))
        .await
        .unwrap();

    let mut watches = Vec::new();
    for _ in 0..4 {
        let mut watch = registry.watch("3").await.unwrap();
        // Consume the current-value delivery.
        let first = watch.updates.recv().await.unwrap();
        assert!(first.hosted_anchor_id.is_none());
        watches.push(watch);
    }

    registry.publish_hosted_anchor("3", "cid-fan").await.unwrap();

    for watch in &mut watches {
        let record = watch.updates.recv().await.unwrap();
        assert_eq!(record.hosted_anchor_id.as_deref(), Some("cid-fan"));
    }
}

#[tokio::test]
async fn watchers_of_other_rooms_are_not_notified() {
    let registry = Arc::new(InMemoryRegistry::new());
    let mut other = registry.watch("2").await.unwrap();

    registry
        .create_room("1", &RoomRecord::new("1", 1))
        .await
        .unwrap();
    registry.publish_hosted_anchor("1", "cid-1").await.unwrap();

    assert!(other.updates.try_recv().is_err());
}

#[tokio::test]
async fn publish_after_watch_wakes_a_waiting_task() {
    let registry = Arc::new(InMemoryRegistry::new());
    let rendezvous = RendezvousProtocol::new(Arc::clone(&registry));

    let token = rendezvous.begin_watch("5").await;
    let waiting = rendezvous.clone();
    let task = tokio::spawn(async move { waiting.watch_for_hosted_anchor(token).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.publish_hosted_anchor("5", "cid-5").await.unwrap();

    let anchor_id = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(anchor_id, "cid-5");
}

#[tokio::test]
async fn timestamps_are_refreshed_on_publish() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry
        .create_room("6", &RoomRecord::new("6", 1))
        .await
        .unwrap();

    registry.publish_hosted_anchor("6", "cid-6").await.unwrap();
    let record = registry.room("6").await.unwrap();
    assert!(record.updated_at_timestamp > 1);
    assert_eq!(record.display_name, "6");
}
