//! WebSocket session host.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Register the connection with the hub and pump its outbound queue
//! - Lifecycle: ping/pong, idle timeout, frame size limit
//! - Report the end of the session (`disconnect` on a clean close, `fail`
//!   otherwise)
//!
//! The loop owns only the receiving half of the outbound queue. When the hub
//! drops the sender (deauth), the queue drains and the session closes.

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use sigrelay_core::protocol::Envelope;
use sigrelay_core::RelayError;

use crate::app_state::AppState;
use crate::hub::{ConnectionId, Hub};
use crate::transport::codec::{decode, encode, error_frame, frame_len, Inbound};

pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_session(app, socket))
}

async fn run_session(app: AppState, socket: WebSocket) {
    let hub = app.hub();
    let (out_tx, out_rx) = hub.outbound_channel();
    let conn = hub.connect(out_tx);
    let span = tracing::info_span!("session", %conn);

    let outcome = session_loop(&app, &hub, conn, socket, out_rx)
        .instrument(span)
        .await;
    match outcome {
        Ok(()) => hub.disconnect(conn),
        Err(reason) => {
            tracing::warn!(%conn, %reason, "session failed");
            hub.fail(conn, &reason)
        }
    };
}

/// Runs until the socket or the outbound queue closes. `Err` carries the
/// failure reason reported to the hub.
async fn session_loop(
    app: &AppState,
    hub: &Hub,
    conn: ConnectionId,
    socket: WebSocket,
    mut out_rx: mpsc::Receiver<Envelope>,
) -> Result<(), String> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let gw = &app.cfg().gateway;
    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);
    let max_frame = app.cfg().hub.max_frame_bytes;

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    tracing::debug!("session started");

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                let Some(env) = maybe_out else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(());
                };
                let msg = match encode(&env) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unencodable envelope");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(msg).await {
                    return Err(format!("write failed: {e}"));
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { return Ok(()); };
                let msg = incoming.map_err(|e| format!("read failed: {e}"))?;
                last_activity = Instant::now();

                // cheap-first: size limit before any decoding
                let len = frame_len(&msg);
                if len > max_frame {
                    tracing::warn!(len, max_frame, "frame too large; closing");
                    let err = RelayError::BadRequest(format!("frame of {len} bytes exceeds {max_frame}"));
                    if let Ok(frame) = error_frame(&err) {
                        let _ = ws_tx.send(frame).await;
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Err("frame too large".into());
                }

                match decode(msg) {
                    Ok(Inbound::Text(s)) => hub.handle_text(conn, &s),
                    Ok(Inbound::Ping(payload)) => {
                        if let Err(e) = ws_tx.send(Message::Pong(payload)).await {
                            return Err(format!("write failed: {e}"));
                        }
                    }
                    Ok(Inbound::Pong(_)) => {}
                    Ok(Inbound::Close) => return Ok(()),
                    Err(e) => {
                        tracing::debug!(error = %e, "frame rejected");
                        if let Ok(frame) = error_frame(&e) {
                            if let Err(e) = ws_tx.send(frame).await {
                                return Err(format!("write failed: {e}"));
                            }
                        }
                    }
                }
            }

            // ping
            _ = ping_tick.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    return Err(format!("ping failed: {e}"));
                }
            }

            // idle timeout
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    if let Ok(frame) = error_frame(&RelayError::Timeout) {
                        let _ = ws_tx.send(frame).await;
                    }
                    return Err("idle timeout".into());
                }
            }
        }
    }
}
