//! # Shared Room Demo
//!
//! Runs the full host/resolve rendezvous between two clients in one process:
//!
//! 1. The hosting client creates a room and gets its code
//! 2. A surface tap hosts an anchor with a stand-in perception gateway
//! 3. The resolving client enters the code and waits for the hosted id
//! 4. Both sides print their session updates as they arrive
//!
//! ## Running
//!
//! ```sh
//! cargo run --example shared_room
//!
//! # Verbose output:
//! RUST_LOG=debug cargo run --example shared_room
//! ```

use std::sync::Arc;
use std::time::Duration;

use anchor_rendezvous::{
    AnchorSessionClient, HostOutcome, InMemoryRegistry, LocalAnchor, PerceptionGateway,
    ResolveOutcome, SessionConfig, SessionState, Transform,
};
use async_trait::async_trait;

/// Stand-in perception gateway: answers every host and resolve after a short
/// artificial delay, as a real tracking stack would.
struct DemoGateway;

#[async_trait]
impl PerceptionGateway for DemoGateway {
    async fn host(&self, anchor: LocalAnchor) -> HostOutcome {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracing::info!("hosted local anchor {}", anchor.id);
        HostOutcome::success(format!("cid-{}", anchor.id))
    }

    async fn resolve(&self, cloud_anchor_id: &str) -> ResolveOutcome {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracing::info!("resolved {cloud_anchor_id}");
        ResolveOutcome::success(Transform::translation(0.5, 0.0, -1.0))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Both clients share one registry, standing in for the realtime store.
    let registry = Arc::new(InMemoryRegistry::new());

    // ── Hosting side ────────────────────────────────────────────────
    let (mut host_client, mut host_updates) =
        AnchorSessionClient::start(Arc::clone(&registry), DemoGateway, SessionConfig::new());

    host_client.request_host()?;
    let mut room_code = String::new();
    while let Some(update) = host_updates.recv().await {
        tracing::info!("[host] {:?}: {}", update.state, update.message);
        match update.state {
            SessionState::RoomReady => {
                room_code = update.room_code.clone();
                // The user taps a detected plane.
                host_client.tap(Transform::translation(0.0, 0.0, -0.5))?;
            }
            SessionState::HostingDone => break,
            _ => {}
        }
    }
    tracing::info!("[host] anchor hosted in room {room_code}");

    // ── Resolving side ──────────────────────────────────────────────
    let (mut resolve_client, mut resolve_updates) =
        AnchorSessionClient::start(Arc::clone(&registry), DemoGateway, SessionConfig::new());

    resolve_client.request_resolve()?;
    resolve_client.submit_room_code(room_code)?;
    while let Some(update) = resolve_updates.recv().await {
        tracing::info!("[resolve] {:?}: {}", update.state, update.message);
        if update.state == SessionState::ResolvingDone {
            break;
        }
    }

    host_client.shutdown().await;
    resolve_client.shutdown().await;
    Ok(())
}
