//! The realtime change feed.
//!
//! One WebSocket connection per gateway, started lazily on the first
//! subscription. Frames are JSON [`ChangeEvent`]s; each is fanned out
//! to subscribers over a broadcast channel. A malformed frame is
//! logged and dropped, never surfaced as a fault. When the connection
//! closes it is re-established with exponential backoff until the
//! feed is shut down; events missed while disconnected are not
//! replayed.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::change::{parse_change, ChangeEvent, ChangeFilter, ChangeTable, Subscription};

/// Broadcast channel capacity for change events.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Tunable parameters for the exponential-backoff reconnect strategy.
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Shared fan-out hub for one gateway's change feed.
pub(crate) struct RealtimeFeed {
    ws_url: String,
    change_tx: broadcast::Sender<ChangeEvent>,
    cancel: CancellationToken,
    started: tokio::sync::Mutex<bool>,
}

impl RealtimeFeed {
    /// Create a feed for the given change-stream URL. No connection is
    /// made until the first [`subscribe`](Self::subscribe).
    pub fn new(ws_url: String) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            ws_url,
            change_tx,
            cancel: CancellationToken::new(),
            started: tokio::sync::Mutex::new(false),
        }
    }

    /// Register interest in one table, starting the connection task if
    /// this is the first subscriber.
    pub async fn subscribe(&self, table: ChangeTable, filter: ChangeFilter) -> Subscription {
        self.ensure_started().await;
        Subscription::new(table, filter, self.change_tx.subscribe())
    }

    /// Stop the connection task. Subscriptions drain and then yield
    /// `None`. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn ensure_started(&self) {
        let mut started = self.started.lock().await;
        if *started {
            return;
        }
        *started = true;

        let ws_url = self.ws_url.clone();
        let change_tx = self.change_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            run_feed(ws_url, change_tx, cancel).await;
        });
    }
}

/// Connect-read-reconnect loop. Runs until cancelled.
async fn run_feed(
    ws_url: String,
    change_tx: broadcast::Sender<ChangeEvent>,
    cancel: CancellationToken,
) {
    let config = ReconnectConfig::default();
    let mut delay = config.initial_delay;

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect_async(&ws_url) => result,
        };

        match connected {
            Ok((stream, _response)) => {
                tracing::info!(url = %ws_url, "Connected to change feed");
                delay = config.initial_delay;
                read_changes(stream, &change_tx, &cancel).await;
                if cancel.is_cancelled() {
                    return;
                }
                tracing::info!(url = %ws_url, "Change feed connection lost");
            }
            Err(e) => {
                tracing::warn!(url = %ws_url, error = %e, "Change feed connect failed");
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &config);
    }
}

/// Read frames until the socket closes, a receive error occurs, or
/// the feed is cancelled.
async fn read_changes(
    mut stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    change_tx: &broadcast::Sender<ChangeEvent>,
    cancel: &CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match parse_change(&text) {
                Ok(event) => {
                    // Zero receivers just means no view is mounted.
                    let _ = change_tx.send(event);
                }
                Err(e) => {
                    tracing::warn!(error = %e, raw_frame = %text, "Dropped malformed change event");
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary frame on change feed");
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Change feed closed by gateway");
                return;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "Change feed receive error");
                return;
            }
            None => return,
        }
    }
}
