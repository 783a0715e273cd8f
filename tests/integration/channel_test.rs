//! Integration tests for channel lifecycle, rooms, and reconnection.

mod helpers;

use std::time::Duration;

use helpers::{settle, test_config, TestAuthority};
use syncline::{
    ChannelManager, ClientMessage, ConflictPolicy, ConnectionState, ErrorKind, RoomKind,
};

fn channel(authority: &TestAuthority) -> std::sync::Arc<ChannelManager> {
    ChannelManager::new(authority.transport(), test_config(ConflictPolicy::Merge).channel)
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);

    manager.connect("token").await.expect("first connect");
    manager.connect("token").await.expect("second connect");

    assert!(manager.is_connected());
    assert_eq!(authority.handshake_count(), 1);
}

#[tokio::test]
async fn test_handshake_rejection_surfaces_error() {
    let authority = TestAuthority::new();
    authority.reject_handshake(true);
    let manager = channel(&authority);

    let err = manager.connect("bad-token").await.expect_err("handshake");
    assert_eq!(err.kind, ErrorKind::Handshake);
    assert_eq!(manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_emit_when_disconnected_is_silently_dropped() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);

    manager
        .emit(ClientMessage::Ping { timestamp: 0 })
        .await;

    assert!(authority.received().is_empty());
}

#[tokio::test]
async fn test_join_room_requires_connection() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);

    manager.join_room(RoomKind::Document, "doc-1").await;

    assert!(manager.joined_rooms().await.is_empty());
    assert!(authority.received().is_empty());
}

#[tokio::test]
async fn test_disconnect_clears_rooms_and_listeners() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);

    manager.connect("token").await.expect("connect");
    manager.join_room(RoomKind::Document, "doc-1").await;
    manager.on(|_| {});
    assert_eq!(manager.joined_rooms().await.len(), 1);
    assert_eq!(manager.listener_count(), 1);

    manager.disconnect().await;

    assert!(!manager.is_connected());
    assert!(manager.joined_rooms().await.is_empty());
    assert_eq!(manager.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_triggers_reconnect() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);
    manager.connect("token").await.expect("connect");

    let mut states = manager.state_changes();
    authority.drop_link();

    // Disconnected first, then Connected again after one backoff delay.
    let mut saw_disconnected = false;
    loop {
        tokio::time::timeout(Duration::from_secs(30), states.changed())
            .await
            .expect("state change")
            .expect("watch alive");
        match *states.borrow() {
            ConnectionState::Disconnected => saw_disconnected = true,
            ConnectionState::Connected => break,
            _ => {}
        }
    }

    assert!(saw_disconnected);
    assert_eq!(authority.handshake_count(), 2);
    // Room membership is not replayed by the manager.
    assert!(manager.joined_rooms().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_budget_exhaustion_reports_unreachable() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);
    manager.connect("token").await.expect("connect");

    let mut states = manager.state_changes();
    authority.fail_next_opens(10);
    authority.drop_link();

    loop {
        tokio::time::timeout(Duration::from_secs(60), states.changed())
            .await
            .expect("state change")
            .expect("watch alive");
        if *states.borrow() == ConnectionState::Unreachable {
            break;
        }
    }

    // Exactly max_reconnect_attempts (3) opens were attempted and failed;
    // no further attempts are made after the terminal state.
    assert_eq!(authority.fail_opens_remaining(), 7);
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(authority.fail_opens_remaining(), 7);
    assert_eq!(*states.borrow(), ConnectionState::Unreachable);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_disconnect_suppresses_reconnect() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);
    manager.connect("token").await.expect("connect");

    manager.disconnect().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    assert_eq!(authority.handshake_count(), 1);
    assert_eq!(manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_pings_while_connected() {
    let authority = TestAuthority::new();
    let manager = channel(&authority);
    manager.connect("token").await.expect("connect");

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let pings = authority
        .received()
        .into_iter()
        .filter(|msg| matches!(msg, ClientMessage::Ping { .. }))
        .count();
    assert!(pings >= 2, "expected at least two pings, saw {pings}");
}
