//! Transport Manager
//!
//! Owns the single WebSocket connection to the console endpoint. Runs as one
//! spawned task; connections are strictly sequential, so there is never more
//! than one open at a time.
//!
//! Every close, whatever its cause (including a connect attempt that never
//! opened), schedules exactly one reconnect after a fixed delay. There is no
//! backoff and no retry cap. Errors are reported but never reconnect on their
//! own; the close that follows them does. Only [`TransportHandle::stop`] ends
//! the loop.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Delay between a close and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Identifies one connection attempt. Increases monotonically per manager.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle and data events, delivered in order.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// A connect attempt started. `attempt` counts attempts since the last
    /// successful open, starting at 1.
    Connecting {
        connection: ConnectionId,
        attempt: u64,
    },
    Open {
        connection: ConnectionId,
    },
    /// One text frame from the server.
    Message {
        connection: ConnectionId,
        raw: String,
    },
    Error {
        connection: ConnectionId,
        error: TransportError,
    },
    /// The connection is gone. `reconnect_in` is `None` only after a stop.
    Closed {
        connection: ConnectionId,
        reconnect_in: Option<Duration>,
    },
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// `ws://` or `wss://` URL.
    pub url: String,
    pub reconnect_delay: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// A frame addressed to the connection it was produced for.
struct Frame {
    connection: ConnectionId,
    text: String,
}

enum ConnectionEnd {
    Lost,
    Stopped,
}

pub struct TransportManager;

impl TransportManager {
    /// Start connecting. Must be called inside a tokio runtime.
    pub fn spawn(config: TransportConfig) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(config, event_tx, frame_rx, cancel.clone()));

        let handle = TransportHandle {
            frames: frame_tx,
            cancel,
            task: Some(task),
        };
        (handle, event_rx)
    }
}

/// Control side of a running transport. Dropping it stops the transport.
pub struct TransportHandle {
    frames: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    /// Queue a text frame for `connection`.
    ///
    /// Frames for any connection other than the currently open one are
    /// discarded by the transport, so a frame produced for a connection that
    /// has since died is never written to its replacement.
    pub fn send(&self, connection: ConnectionId, text: String) -> bool {
        self.frames.send(Frame { connection, text }).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Close the current connection (with a close frame) and stop
    /// reconnecting. Waits for the transport task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Deliver one event, giving up as soon as the transport is stopped.
///
/// Returns `false` when the event was not delivered, either because of a
/// stop or because the receiver is gone.
async fn emit(
    events: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
    event: TransportEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

/// Final event of a stopped transport. Never waits for channel room.
fn stopped(events: &mpsc::Sender<TransportEvent>, connection: ConnectionId) {
    if events
        .try_send(TransportEvent::Closed {
            connection,
            reconnect_in: None,
        })
        .is_err()
    {
        debug!(%connection, "stop notice dropped, event channel full or closed");
    }
}

async fn run(
    config: TransportConfig,
    events: mpsc::Sender<TransportEvent>,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) {
    let mut next_id = 0u64;
    let mut attempt = 0u64;

    loop {
        next_id += 1;
        attempt += 1;
        let connection = ConnectionId(next_id);

        debug!(%connection, attempt, url = %config.url, "connecting");
        if !emit(&events, &cancel, TransportEvent::Connecting { connection, attempt }).await {
            stopped(&events, connection);
            return;
        }

        let connected = tokio::select! {
            _ = cancel.cancelled() => {
                stopped(&events, connection);
                return;
            }
            result = tokio_tungstenite::connect_async(config.url.as_str()) => result,
        };

        match connected {
            Ok((ws, _response)) => {
                attempt = 0;
                // Anything still queued was produced for an earlier connection.
                while frames.try_recv().is_ok() {}

                info!(%connection, "connection open");
                let end = if emit(&events, &cancel, TransportEvent::Open { connection }).await {
                    run_connection(connection, ws, &events, &mut frames, &cancel).await
                } else {
                    close_quietly(ws).await;
                    ConnectionEnd::Stopped
                };

                match end {
                    ConnectionEnd::Stopped => {
                        info!(%connection, "transport stopped");
                        stopped(&events, connection);
                        return;
                    }
                    ConnectionEnd::Lost => {
                        info!(%connection, "connection lost");
                    }
                }
            }
            Err(e) => {
                let error = TransportError::from_tungstenite(&e);
                warn!(%connection, attempt, error = %error, "connect failed");
                if !emit(&events, &cancel, TransportEvent::Error { connection, error }).await {
                    stopped(&events, connection);
                    return;
                }
            }
        }

        let closed = TransportEvent::Closed {
            connection,
            reconnect_in: Some(config.reconnect_delay),
        };
        if !emit(&events, &cancel, closed).await {
            stopped(&events, connection);
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                stopped(&events, connection);
                return;
            }
            () = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

async fn close_quietly<S>(mut ws: tokio_tungstenite::WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let _ = ws.close(None).await;
}

async fn run_connection<S>(
    connection: ConnectionId,
    ws: tokio_tungstenite::WebSocketStream<S>,
    events: &mpsc::Sender<TransportEvent>,
    frames: &mut mpsc::UnboundedReceiver<Frame>,
    cancel: &CancellationToken,
) -> ConnectionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_write, mut ws_read) = ws.split();

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break ConnectionEnd::Stopped,

            Some(frame) = frames.recv() => {
                if frame.connection != connection {
                    debug!(%connection, stale = %frame.connection, "dropping frame for stale connection");
                    continue;
                }
                if let Err(e) = ws_write.send(tungstenite::Message::Text(frame.text.into())).await {
                    let error = TransportError::from_tungstenite(&e);
                    warn!(%connection, error = %error, "write failed");
                    if !emit(events, cancel, TransportEvent::Error { connection, error }).await {
                        return ConnectionEnd::Stopped;
                    }
                    return ConnectionEnd::Lost;
                }
            }

            msg = ws_read.next() => {
                let raw = match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => text.to_string(),
                    Some(Ok(tungstenite::Message::Binary(data))) => {
                        match String::from_utf8(data.to_vec()) {
                            Ok(raw) => raw,
                            Err(_) => {
                                warn!(%connection, len = data.len(), "dropping non-UTF-8 binary frame");
                                continue;
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        debug!(%connection, ?frame, "server closed connection");
                        return ConnectionEnd::Lost;
                    }
                    // Ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let error = TransportError::from_tungstenite(&e);
                        warn!(%connection, error = %error, "read failed");
                        if !emit(events, cancel, TransportEvent::Error { connection, error }).await {
                            return ConnectionEnd::Stopped;
                        }
                        return ConnectionEnd::Lost;
                    }
                    None => return ConnectionEnd::Lost,
                };
                if !emit(events, cancel, TransportEvent::Message { connection, raw }).await {
                    break ConnectionEnd::Stopped;
                }
            }
        }
    };

    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
    let _ = ws_write.close().await;
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }

    #[test]
    fn default_delay_is_three_seconds() {
        let config = TransportConfig::new("ws://localhost:8765/ws");
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn refused_connect_reports_error_then_close_with_delay() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = TransportConfig::new(format!("ws://127.0.0.1:{}/ws", port));
        config.reconnect_delay = Duration::from_millis(20);
        let (handle, mut events) = TransportManager::spawn(config);

        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Connecting { connection: ConnectionId(1), attempt: 1 })
        ));
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Error { connection: ConnectionId(1), .. })
        ));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Closed {
                connection: ConnectionId(1),
                reconnect_in: Some(Duration::from_millis(20)),
            })
        );
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Connecting { connection: ConnectionId(2), attempt: 2 })
        ));

        handle.stop().await;
    }
}
