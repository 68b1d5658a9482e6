#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! End-to-end session tests over the in-memory registry.
//!
//! These drive [`AnchorSessionClient`] the way a presentation layer would:
//! enqueue events, then assert on the update stream and on the shared
//! registry contents.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anchor_rendezvous::{
    AnchorSessionClient, CloudAnchorState, HostOutcome, InMemoryRegistry, ResolveOutcome,
    RoomRegistry, SessionConfig, SessionState, Transform,
};

use common::{assert_state_never_reached, wait_for_state, ScriptedGateway, SlowWatchRegistry};

#[tokio::test]
async fn host_then_resolve_between_two_clients() {
    let registry = Arc::new(InMemoryRegistry::new());

    // Hosting client: room "1", tap, host, publish.
    let (mut host_client, mut host_updates) = AnchorSessionClient::start(
        Arc::clone(&registry),
        ScriptedGateway::open(),
        SessionConfig::new(),
    );
    host_client.request_host().unwrap();
    let update = wait_for_state(&mut host_updates, SessionState::RoomReady).await;
    assert_eq!(update.room_code, "1");

    host_client.tap(Transform::translation(1.0, 0.0, -2.0)).unwrap();
    wait_for_state(&mut host_updates, SessionState::HostingDone).await;

    // Resolving client: same registry, enters the code, ends up resolving
    // the id the hosting client published.
    let resolver_gateway = ScriptedGateway::open();
    let resolved_ids = Arc::clone(&resolver_gateway.resolved_ids);
    let (mut resolve_client, mut resolve_updates) = AnchorSessionClient::start(
        Arc::clone(&registry),
        resolver_gateway,
        SessionConfig::new(),
    );
    resolve_client.request_resolve().unwrap();
    wait_for_state(&mut resolve_updates, SessionState::AwaitingRoomCode).await;
    resolve_client.submit_room_code("1").unwrap();

    let update = wait_for_state(&mut resolve_updates, SessionState::ResolvingDone).await;
    assert!(update.message.contains("successfully"));
    assert_eq!(resolved_ids.lock().unwrap().as_slice(), ["cid-scripted"]);

    host_client.shutdown().await;
    resolve_client.shutdown().await;
}

#[tokio::test]
async fn resolver_waiting_before_host_completes_is_woken_by_publish() {
    let registry = Arc::new(InMemoryRegistry::new());

    // Resolver enters a code for a room that has no hosted anchor yet.
    let (mut resolve_client, mut resolve_updates) = AnchorSessionClient::start(
        Arc::clone(&registry),
        ScriptedGateway::open(),
        SessionConfig::new(),
    );
    resolve_client.request_resolve().unwrap();
    resolve_client.submit_room_code("1").unwrap();
    wait_for_state(&mut resolve_updates, SessionState::Resolving).await;

    // Host side comes along later, gets code "1", and publishes.
    let (mut host_client, mut host_updates) = AnchorSessionClient::start(
        Arc::clone(&registry),
        ScriptedGateway::open(),
        SessionConfig::new(),
    );
    host_client.request_host().unwrap();
    let update = wait_for_state(&mut host_updates, SessionState::RoomReady).await;
    assert_eq!(update.room_code, "1");
    host_client.tap(Transform::IDENTITY).unwrap();
    wait_for_state(&mut host_updates, SessionState::HostingDone).await;

    wait_for_state(&mut resolve_updates, SessionState::ResolvingDone).await;

    host_client.shutdown().await;
    resolve_client.shutdown().await;
}

#[tokio::test]
async fn cancel_during_hosting_drops_the_stale_host_result() {
    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = ScriptedGateway::gated();
    let host_gate = Arc::clone(&gateway.host_gate);

    let (mut client, mut updates) =
        AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

    client.request_host().unwrap();
    wait_for_state(&mut updates, SessionState::RoomReady).await;
    client.tap(Transform::IDENTITY).unwrap();
    wait_for_state(&mut updates, SessionState::Hosting).await;

    // Cancel while the gateway call is still pending, then let it finish.
    client.cancel().unwrap();
    wait_for_state(&mut updates, SessionState::Idle).await;
    host_gate.add_permits(1);

    // The late HostFinished belongs to the old generation and is dropped:
    // no HostingDone, and nothing published under the abandoned room.
    assert_state_never_reached(&mut updates, SessionState::HostingDone).await;
    assert_eq!(client.current_state().await, SessionState::Idle);
    let record = registry.room("1").await;
    assert!(record.is_none_or(|r| r.hosted_anchor_id.is_none()));

    client.shutdown().await;
}

#[tokio::test]
async fn cancel_during_resolve_tears_down_the_watch() {
    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = ScriptedGateway::open();
    let resolve_calls = Arc::clone(&gateway.resolve_calls);

    let (mut client, mut updates) =
        AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

    client.request_resolve().unwrap();
    client.submit_room_code("8").unwrap();
    wait_for_state(&mut updates, SessionState::Resolving).await;

    // Let the watch install before cancelling.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.watcher_count().await, 1);

    client.cancel().unwrap();
    wait_for_state(&mut updates, SessionState::Idle).await;

    // Poll: the unwatch happens on the loop before the next event, but the
    // registry mutation itself is async.
    for _ in 0..50 {
        if registry.watcher_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(registry.watcher_count().await, 0);

    // A publish after cancellation must not start a resolve.
    registry.publish_hosted_anchor("8", "cid-late").await.unwrap();
    assert_state_never_reached(&mut updates, SessionState::Resolving).await;
    assert_eq!(resolve_calls.load(Ordering::SeqCst), 0);

    client.shutdown().await;
}

#[tokio::test]
async fn cancel_before_watch_install_completes_still_tears_it_down() {
    let inner = Arc::new(InMemoryRegistry::new());
    let registry = SlowWatchRegistry::new(Arc::clone(&inner), Duration::from_millis(60));
    let gateway = ScriptedGateway::open();
    let resolve_calls = Arc::clone(&gateway.resolve_calls);

    let (mut client, mut updates) =
        AnchorSessionClient::start(registry, gateway, SessionConfig::new());

    client.request_resolve().unwrap();
    client.submit_room_code("1").unwrap();
    wait_for_state(&mut updates, SessionState::Resolving).await;

    // Cancel while the watch installation round trip is still in flight.
    client.cancel().unwrap();
    wait_for_state(&mut updates, SessionState::Idle).await;

    // The install lands after the cancel; the subscription must not survive
    // it.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(inner.watcher_count().await, 0);

    // A later publish must not wake anything.
    inner.publish_hosted_anchor("1", "cid-late").await.unwrap();
    assert_state_never_reached(&mut updates, SessionState::Resolving).await;
    assert_eq!(resolve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.current_state().await, SessionState::Idle);

    client.shutdown().await;
}

#[tokio::test]
async fn empty_room_code_cancels_the_resolve_prompt() {
    let registry = Arc::new(InMemoryRegistry::new());
    let (mut client, mut updates) =
        AnchorSessionClient::start(registry, ScriptedGateway::open(), SessionConfig::new());

    client.request_resolve().unwrap();
    let update = wait_for_state(&mut updates, SessionState::AwaitingRoomCode).await;
    assert_eq!(update.message, "Enter a room code to resolve.");

    client.submit_room_code("").unwrap();
    let update = wait_for_state(&mut updates, SessionState::Idle).await;
    assert_eq!(update.room_code, "");

    client.shutdown().await;
}

#[tokio::test]
async fn room_creation_failure_returns_to_idle_with_message() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.set_offline(true);

    let (mut client, mut updates) = AnchorSessionClient::start(
        Arc::clone(&registry),
        ScriptedGateway::open(),
        SessionConfig::new(),
    );

    client.request_host().unwrap();
    wait_for_state(&mut updates, SessionState::CreatingRoom).await;
    let update = wait_for_state(&mut updates, SessionState::Idle).await;
    assert_eq!(
        update.message,
        "Failed to create room. Tap HOST or RESOLVE to begin."
    );

    // The failure is recoverable: the next attempt succeeds.
    registry.set_offline(false);
    client.request_host().unwrap();
    let update = wait_for_state(&mut updates, SessionState::RoomReady).await;
    assert_eq!(update.room_code, "1");

    client.shutdown().await;
}

#[tokio::test]
async fn failed_host_outcome_is_surfaced_and_not_published() {
    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = ScriptedGateway::open();
    gateway.set_host_outcome(HostOutcome::failure(
        CloudAnchorState::ErrorHostingDatasetProcessingFailed,
    ));

    let (mut client, mut updates) =
        AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

    client.request_host().unwrap();
    wait_for_state(&mut updates, SessionState::RoomReady).await;
    client.tap(Transform::IDENTITY).unwrap();

    let update = wait_for_state(&mut updates, SessionState::HostingDone).await;
    assert!(update.message.starts_with("Finished hosting:"));
    assert!(update.message.contains("visual"));

    tokio::time::sleep(Duration::from_millis(30)).await;
    let record = registry.room("1").await.unwrap();
    assert!(record.hosted_anchor_id.is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn failed_resolve_outcome_is_surfaced() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.publish_hosted_anchor("2", "cid-gone").await.unwrap();

    let gateway = ScriptedGateway::open();
    gateway.set_resolve_outcome(ResolveOutcome::failure(
        CloudAnchorState::ErrorCloudIdNotFound,
    ));

    let (mut client, mut updates) =
        AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

    client.request_resolve().unwrap();
    client.submit_room_code("2").unwrap();

    let update = wait_for_state(&mut updates, SessionState::ResolvingDone).await;
    assert!(update.message.starts_with("Finished resolving:"));

    client.shutdown().await;
}

#[tokio::test]
async fn taps_outside_room_ready_are_ignored() {
    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = ScriptedGateway::open();
    let hosted = Arc::clone(&gateway.hosted);

    let (mut client, mut updates) =
        AnchorSessionClient::start(registry, gateway, SessionConfig::new());

    // Idle: tap does nothing.
    client.tap(Transform::IDENTITY).unwrap();
    assert_state_never_reached(&mut updates, SessionState::Hosting).await;
    assert!(hosted.lock().unwrap().is_empty());

    // RoomReady: the first tap hosts, a second tap mid-flight is ignored.
    client.request_host().unwrap();
    wait_for_state(&mut updates, SessionState::RoomReady).await;
    client.tap(Transform::IDENTITY).unwrap();
    client.tap(Transform::IDENTITY).unwrap();
    wait_for_state(&mut updates, SessionState::HostingDone).await;
    assert_eq!(hosted.lock().unwrap().len(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn full_cycle_host_cancel_resolve() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.publish_hosted_anchor("9", "cid-9").await.unwrap();

    let gateway = ScriptedGateway::open();
    let resolved_ids = Arc::clone(&gateway.resolved_ids);
    let (mut client, mut updates) =
        AnchorSessionClient::start(Arc::clone(&registry), gateway, SessionConfig::new());

    // Host, then bail out before tapping.
    client.request_host().unwrap();
    wait_for_state(&mut updates, SessionState::RoomReady).await;
    client.cancel().unwrap();
    wait_for_state(&mut updates, SessionState::Idle).await;

    // Resolve a room someone else hosted.
    client.request_resolve().unwrap();
    client.submit_room_code("9").unwrap();
    wait_for_state(&mut updates, SessionState::ResolvingDone).await;
    assert_eq!(resolved_ids.lock().unwrap().as_slice(), ["cid-9"]);

    client.shutdown().await;
}
