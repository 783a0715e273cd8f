//! Liveness heartbeat for the authority channel.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::message::types::ClientMessage;

/// Run the heartbeat loop for an open channel.
///
/// Sends a liveness ping at a fixed interval while connected. The loop
/// ends when the channel closes or the cancellation token fires.
pub async fn run_heartbeat(
    sender: mpsc::Sender<ClientMessage>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    // The first tick completes immediately; consume it so the first ping
    // goes out one full interval after connect.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let ping = ClientMessage::Ping {
                    timestamp: Utc::now().timestamp_millis(),
                };
                if sender.send(ping).await.is_err() {
                    tracing::debug!("heartbeat send failed, channel closed");
                    break;
                }
            }
        }
    }

    tracing::debug!("heartbeat loop ended");
}
