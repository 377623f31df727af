//! Kitchen display sessions.
//!
//! One task per display. It performs the handshake (upgrade plus the
//! `CONNECTED` welcome frame), then multiplexes the outbound queue fed by
//! the broker, inbound client frames and the heartbeat ticker until
//! something ends the connection.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, StreamExt,
};
use kitchen_feed::backpressure::{outbound_queue, OutboundReceiver};
use kitchen_feed::events::ControlFrame;
use kitchen_feed::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use kitchen_feed::lifecycle::{CloseReason, DisplayConnection};
use kitchen_feed::{FeedConfig, FeedError};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use types::ids::ConnectionId;

// Bound on the courtesy close frame once the session is already ending.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if state.registry().is_shutting_down() {
        return Err(AppError::ServiceUnavailable("Shutting down".into()));
    }
    state
        .rate_limiter
        .check("kitchen:ws_connections", &state.config.ws_rate)?;

    let metrics = Arc::clone(state.metrics());
    Ok(ws
        .on_failed_upgrade(move |err: axum::Error| {
            let err = FeedError::Connection {
                id: None,
                reason: err.to_string(),
            };
            warn!(error = %err, "Display upgrade failed");
            metrics.record_handshake_failure();
        })
        .on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut connection =
        DisplayConnection::new(Arc::clone(state.registry()), Arc::clone(state.metrics()));
    let (mut sink, mut stream) = socket.split();

    if let Err(err) = send_welcome(&mut sink, &state.config.feed).await {
        warn!(error = %err, "Display handshake failed");
        connection.close(CloseReason::HandshakeFailed);
        return;
    }

    let (outbound, mut queue) = outbound_queue(state.config.feed.outbound_capacity);
    let id = match connection.open(outbound) {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "Display could not be registered");
            connection.close(CloseReason::HandshakeFailed);
            return;
        }
    };

    let reason = run_session(id, &mut sink, &mut stream, &mut queue, &state).await;

    if let Err(err) = connection.begin_close(reason) {
        debug!(connection_id = id.get(), error = %err, "Close already in progress");
    }
    if !matches!(reason, CloseReason::ClientClosed | CloseReason::TransportError) {
        let frame = CloseFrame {
            code: close_code_for(reason),
            reason: Utf8Bytes::from(reason.as_str()),
        };
        let _ = timeout(CLOSE_FRAME_TIMEOUT, sink.send(Message::Close(Some(frame)))).await;
    }
    if let Err(err) = connection.finish_close() {
        debug!(connection_id = id.get(), error = %err, "Connection already closed");
    }
}

async fn send_welcome<S>(sink: &mut S, feed: &FeedConfig) -> Result<(), FeedError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let welcome = ControlFrame::Connected {
        heartbeat_interval_ms: u64::try_from(feed.heartbeat_interval.as_millis())
            .unwrap_or(u64::MAX),
    }
    .to_json()?;

    match timeout(feed.handshake_timeout, sink.send(Message::Text(welcome.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(FeedError::Connection {
            id: None,
            reason: err.to_string(),
        }),
        Err(_) => Err(FeedError::Connection {
            id: None,
            reason: "welcome frame timed out".into(),
        }),
    }
}

/// Drive an open session; returns why it ended.
async fn run_session(
    id: ConnectionId,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    queue: &mut OutboundReceiver,
    state: &AppState,
) -> CloseReason {
    let feed = &state.config.feed;
    let mut heartbeat = HeartbeatMonitor::new(feed.max_missed_heartbeats);
    let mut ticker = interval_at(
        Instant::now() + feed.heartbeat_interval,
        feed.heartbeat_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else {
                    // Producer half dropped by the registry.
                    return if state.registry().is_shutting_down() {
                        CloseReason::Shutdown
                    } else {
                        debug!(connection_id = id.get(), "Outbound queue closed by broker");
                        CloseReason::Evicted
                    };
                };
                let message = Message::Text(Utf8Bytes::from(frame.as_str()));
                if let Err(reason) = send_bounded(id, sink, message, feed.send_timeout, queue).await {
                    return reason;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Pong(_))) => heartbeat.on_pong(),
                Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                // Displays have nothing to say; text, binary and pings are ignored.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    let err = FeedError::Connection { id: Some(id), reason: err.to_string() };
                    warn!(connection_id = id.get(), error = %err, "Display transport error");
                    return CloseReason::TransportError;
                }
            },
            _ = ticker.tick() => match heartbeat.on_tick() {
                HeartbeatAction::SendPing => {
                    let ping = Message::Ping(Bytes::new());
                    if let Err(reason) = send_bounded(id, sink, ping, feed.send_timeout, queue).await {
                        return reason;
                    }
                }
                HeartbeatAction::Expire { missed } => {
                    let err = FeedError::HeartbeatTimeout { id, missed };
                    warn!(connection_id = id.get(), error = %err, "Display expired");
                    return CloseReason::HeartbeatTimeout;
                }
            },
        }
    }
}

/// One socket write under the per-send timeout. A write that does not
/// finish in time marks the display as a slow consumer.
async fn send_bounded<S>(
    id: ConnectionId,
    sink: &mut S,
    message: Message,
    limit: Duration,
    queue: &OutboundReceiver,
) -> Result<(), CloseReason>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            let err = FeedError::Connection {
                id: Some(id),
                reason: err.to_string(),
            };
            warn!(connection_id = id.get(), error = %err, "Display write failed");
            Err(CloseReason::TransportError)
        }
        Err(_) => {
            let err = FeedError::SlowConsumer {
                id,
                queued: queue.len(),
            };
            warn!(connection_id = id.get(), error = %err, "Display write timed out");
            Err(CloseReason::SlowConsumer)
        }
    }
}

fn close_code_for(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::Shutdown => close_code::AWAY,
        CloseReason::SlowConsumer | CloseReason::Evicted => close_code::POLICY,
        CloseReason::HeartbeatTimeout => close_code::NORMAL,
        _ => close_code::ERROR,
    }
}
