//! WebSocket stream connection with heartbeat and fixed-delay reconnect.
//!
//! Connects to the management server's stream endpoint and forwards
//! decoded [`StreamMessage`]s through an `mpsc` channel to a single
//! consumer, preserving arrival order. While the connection is open a
//! `{"messageType":"ping"}` heartbeat is sent every 25 seconds
//! (best-effort). On any closure exactly one reconnect is scheduled
//! after a fixed delay; [`shutdown`](StreamHandle::shutdown) cancels the
//! connection and every pending timer.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfsight_api::stream::{ReconnectPolicy, StreamHandle};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("wss://rfsight.local/ws")?;
//!
//! let (handle, mut messages) =
//!     StreamHandle::connect(ws_url, None, ReconnectPolicy::default(), cancel.clone());
//!
//! while let Some(msg) = messages.recv().await {
//!     println!("{msg:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::wire::{StreamMessage, decode_frame};

// ── Heartbeat ────────────────────────────────────────────────────────

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(25);
const HEARTBEAT_FRAME: &str = r#"{"messageType":"ping"}"#;

// ── LinkState ────────────────────────────────────────────────────────

/// Observable connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LinkState {
    /// No connection attempt has started yet.
    #[strum(serialize = "idle")]
    Idle,
    /// A connection attempt is in flight.
    #[strum(serialize = "connecting")]
    Connecting,
    /// The stream is open and frames are flowing.
    #[strum(serialize = "open")]
    Open,
    /// The connection dropped; the single reconnect timer is pending.
    #[strum(serialize = "backoff")]
    Backoff { attempt: u32 },
    /// The loop has exited — cancelled or retry-bounded.
    #[strum(serialize = "closed")]
    Closed,
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy.
///
/// The dashboard stream favors eventual consistency over giving up:
/// every closure schedules one retry after `retry_delay`. `max_retries`
/// bounds consecutive *failed* attempts when set; the default is
/// unbounded.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay between a closure and the next connection attempt. Default: 2s.
    pub retry_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            max_retries: None,
        }
    }
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to a running stream connection.
///
/// Dropping the handle does not tear the connection down — call
/// [`shutdown`](Self::shutdown) (or cancel the parent token) to stop the
/// background task and its timers.
pub struct StreamHandle {
    state_rx: watch::Receiver<LinkState>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Spawn the connection loop and return the handle plus the message
    /// receiver.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. There is exactly one consumer: messages are
    /// delivered in arrival order through the returned `mpsc` receiver.
    /// If `token` is set it is appended to the URL as a `token` query
    /// parameter.
    pub fn connect(
        ws_url: Url,
        token: Option<SecretString>,
        policy: ReconnectPolicy,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, token, msg_tx, state_tx, policy, task_cancel).await;
        });

        (Self { state_rx, cancel }, msg_rx)
    }

    /// Get a receiver for connection lifecycle changes.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down, cancelling the heartbeat
    /// and any pending reconnect timer.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background connection loop ───────────────────────────────────────

/// Main loop: connect → read → on closure, wait the fixed delay → reconnect.
///
/// Structurally there is at most one pending reconnect: the loop owns the
/// single sleep, and cancellation preempts it.
async fn ws_loop(
    ws_url: Url,
    token: Option<SecretString>,
    msg_tx: mpsc::UnboundedSender<StreamMessage>,
    state_tx: watch::Sender<LinkState>,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let url = stream_url_with_token(&ws_url, token.as_ref());
    let mut attempt: u32 = 0;

    loop {
        let _ = state_tx.send(LinkState::Connecting);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &msg_tx, &state_tx, &cancel) => {
                match result {
                    Ok(()) => {
                        tracing::info!("stream disconnected, scheduling reconnect");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "stream error");

                        if let Some(max) = policy.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }
                        attempt += 1;
                    }
                }

                let _ = state_tx.send(LinkState::Backoff { attempt });
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(policy.retry_delay) => {}
                }
            }
        }
    }

    let _ = state_tx.send(LinkState::Closed);
    tracing::debug!("stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and read frames until it drops.
///
/// Decoded messages go to `msg_tx`; malformed frames are dropped with a
/// debug log and never surface as an error. The heartbeat runs only
/// while this connection is alive.
async fn connect_and_read(
    url: &Url,
    msg_tx: &mpsc::UnboundedSender<StreamMessage>,
    state_tx: &watch::Sender<LinkState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("stream connected");
    let _ = state_tx.send(LinkState::Open);

    let (mut write, mut read) = ws_stream.split();

    // First tick after one full period — the server just saw the handshake.
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_PERIOD,
        HEARTBEAT_PERIOD,
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            _ = heartbeat.tick() => {
                // Best-effort keepalive; failures surface through the read side.
                if let Err(e) = write.send(tungstenite::Message::text(HEARTBEAT_FRAME.to_owned())).await {
                    tracing::trace!(error = %e, "heartbeat send failed");
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match decode_frame(&text) {
                            Ok(msg) => {
                                // Send errors just mean the consumer is gone.
                                let _ = msg_tx.send(msg);
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "dropping malformed frame");
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pongs automatically
                        tracing::trace!("stream ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "stream close frame received"
                            );
                        } else {
                            tracing::info!("stream close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── URL construction ─────────────────────────────────────────────────

/// Append the auth token as a `token` query parameter.
///
/// Handles both bare URLs (`?token=`) and URLs that already carry a
/// query string (`&token=`). Without a token the URL passes through
/// unchanged — the server decides whether to accept the connection.
fn stream_url_with_token(url: &Url, token: Option<&SecretString>) -> Url {
    let Some(token) = token else {
        return url.clone();
    };
    let mut with_token = url.clone();
    with_token
        .query_pairs_mut()
        .append_pair("token", token.expose_secret());
    with_token
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn default_reconnect_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.retry_delay, Duration::from_secs(2));
        assert!(policy.max_retries.is_none());
    }

    #[test]
    fn token_appended_to_bare_url() {
        let url = Url::parse("wss://rfsight.local/ws").unwrap();
        let token = SecretString::from("abc123".to_owned());
        let with = stream_url_with_token(&url, Some(&token));
        assert_eq!(with.as_str(), "wss://rfsight.local/ws?token=abc123");
    }

    #[test]
    fn token_appended_to_url_with_existing_query() {
        let url = Url::parse("wss://rfsight.local/ws?org=org1").unwrap();
        let token = SecretString::from("abc123".to_owned());
        let with = stream_url_with_token(&url, Some(&token));
        assert_eq!(with.as_str(), "wss://rfsight.local/ws?org=org1&token=abc123");
    }

    #[test]
    fn url_unchanged_without_token() {
        let url = Url::parse("wss://rfsight.local/ws").unwrap();
        assert_eq!(stream_url_with_token(&url, None), url);
    }

    #[tokio::test]
    async fn retry_bound_stops_the_loop() {
        // Nothing listens on this port; every attempt fails immediately.
        let url = Url::parse("ws://127.0.0.1:1/ws").unwrap();
        let policy = ReconnectPolicy {
            retry_delay: Duration::from_millis(10),
            max_retries: Some(1),
        };
        let (handle, _messages) =
            StreamHandle::connect(url, None, policy, CancellationToken::new());

        let mut state = handle.state();
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *state.borrow_and_update() == LinkState::Closed {
                    break;
                }
                state.changed().await.unwrap();
            }
        })
        .await;
        assert!(closed.is_ok(), "loop should give up after max_retries");
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_reconnect() {
        let url = Url::parse("ws://127.0.0.1:1/ws").unwrap();
        let policy = ReconnectPolicy {
            // Long enough that the test can only pass via cancellation.
            retry_delay: Duration::from_secs(600),
            max_retries: None,
        };
        let (handle, _messages) =
            StreamHandle::connect(url, None, policy, CancellationToken::new());

        let mut state = handle.state();
        // Wait until the loop is parked in its reconnect sleep.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(*state.borrow_and_update(), LinkState::Backoff { .. }) {
                    break;
                }
                state.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        handle.shutdown();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *state.borrow_and_update() == LinkState::Closed {
                    break;
                }
                state.changed().await.unwrap();
            }
        })
        .await;
        assert!(closed.is_ok(), "shutdown should preempt the reconnect timer");
    }

    #[tokio::test]
    async fn one_connection_attempt_per_closure() {
        // Accept-and-drop listener: every handshake fails fast, so each
        // accept corresponds to exactly one scheduled reconnect.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepts);
        tokio::spawn(async move {
            loop {
                if let Ok((sock, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(sock);
                }
            }
        });

        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        let policy = ReconnectPolicy {
            retry_delay: Duration::from_millis(100),
            max_retries: None,
        };
        let (handle, _messages) =
            StreamHandle::connect(url, None, policy, CancellationToken::new());

        // Let a few cycles run, then stop.
        tokio::time::timeout(Duration::from_secs(10), async {
            while accepts.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        handle.shutdown();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let settled = accepts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            accepts.load(Ordering::SeqCst),
            settled,
            "no further connection attempts after shutdown"
        );
    }
}
