//! Integration tests for the integrity monitor attached to an editing
//! surface through the session facade.

mod helpers;

use chrono::{Duration as ChronoDuration, Utc};
use helpers::{settle, test_config, TestAuthority};
use syncline::{
    ConflictPolicy, DocumentId, PasteInput, RiskLevel, SurfaceEvent, SyncSession,
};
use tokio::sync::mpsc;

async fn open_session(authority: &TestAuthority) -> SyncSession {
    SyncSession::builder(test_config(ConflictPolicy::Merge))
        .transport(authority.transport())
        .initial_content("Hello")
        .open("token", DocumentId::new())
        .await
        .expect("session open")
}

fn suspicious_paste() -> SurfaceEvent {
    SurfaceEvent::Paste(PasteInput::plain("x".repeat(600)))
}

#[tokio::test]
async fn test_surface_events_feed_risk_escalation() {
    let authority = TestAuthority::new();
    let session = open_session(&authority).await;

    let (tx, rx) = mpsc::channel(16);
    let _guard = session.attach_editor(rx);

    tx.send(suspicious_paste()).await.expect("send");
    settle().await;
    assert_eq!(session.integrity_stats().risk_level, RiskLevel::Low);

    for _ in 0..2 {
        tx.send(suspicious_paste()).await.expect("send");
    }
    settle().await;
    assert_eq!(session.integrity_stats().risk_level, RiskLevel::Medium);

    for _ in 0..3 {
        tx.send(suspicious_paste()).await.expect("send");
    }
    settle().await;

    let stats = session.integrity_stats();
    assert_eq!(stats.risk_level, RiskLevel::High);
    assert_eq!(stats.suspicious_count, 6);
}

#[tokio::test]
async fn test_event_log_is_bounded_through_surface() {
    let authority = TestAuthority::new();
    let session = open_session(&authority).await;

    let (tx, rx) = mpsc::channel(32);
    let _guard = session.attach_editor(rx);

    for _ in 0..15 {
        tx.send(SurfaceEvent::Paste(PasteInput::plain("short")))
            .await
            .expect("send");
    }
    settle().await;

    let stats = session.integrity_stats();
    assert_eq!(stats.total_pastes, 15);
    assert_eq!(stats.recent_events.len(), 10);
    assert_eq!(stats.risk_level, RiskLevel::Low);
}

#[tokio::test]
async fn test_keystroke_burst_detection_through_surface() {
    let authority = TestAuthority::new();
    let session = open_session(&authority).await;

    let (tx, rx) = mpsc::channel(32);
    let _guard = session.attach_editor(rx);

    let start = Utc::now();
    for i in 0..11 {
        tx.send(SurfaceEvent::Keystroke {
            at: start + ChronoDuration::milliseconds(5 * i),
        })
        .await
        .expect("send");
    }
    settle().await;

    let stats = session.integrity_stats();
    assert_eq!(stats.bursts_detected, 1);
    assert_eq!(stats.suspicious_count, 1);
}

#[tokio::test]
async fn test_detach_stops_observation() {
    let authority = TestAuthority::new();
    let session = open_session(&authority).await;

    let (tx, rx) = mpsc::channel(16);
    let guard = session.attach_editor(rx);

    tx.send(suspicious_paste()).await.expect("send");
    settle().await;
    assert_eq!(session.integrity_stats().suspicious_count, 1);

    guard.detach();
    settle().await;

    // Events sent after detach never reach the monitor.
    let _ = tx.send(suspicious_paste()).await;
    settle().await;
    assert_eq!(session.integrity_stats().suspicious_count, 1);
}

#[tokio::test]
async fn test_toggle_and_clear_via_session() {
    let authority = TestAuthority::new();
    let session = open_session(&authority).await;

    let (tx, rx) = mpsc::channel(16);
    let _guard = session.attach_editor(rx);

    tx.send(suspicious_paste()).await.expect("send");
    settle().await;
    assert_eq!(session.integrity_stats().suspicious_count, 1);

    // Paused monitoring drops observations but keeps history.
    session.toggle_monitoring(false);
    tx.send(suspicious_paste()).await.expect("send");
    settle().await;
    assert_eq!(session.integrity_stats().suspicious_count, 1);

    session.toggle_monitoring(true);
    tx.send(suspicious_paste()).await.expect("send");
    settle().await;
    assert_eq!(session.integrity_stats().suspicious_count, 2);

    // Clearing is an explicit caller action.
    session.clear_integrity_data();
    let stats = session.integrity_stats();
    assert_eq!(stats.suspicious_count, 0);
    assert_eq!(stats.total_pastes, 0);
    assert!(stats.recent_events.is_empty());
}
