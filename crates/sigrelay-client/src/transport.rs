//! WebSocket connector (tokio-tungstenite).
//!
//! `connect` dials the hub, wires a [`ClientHandle`] to the socket and spawns
//! the pump task. The pump ends when the hub closes the socket, and the handle
//! is then told it was disconnected. Abort the returned task to drop the
//! socket from this side.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use sigrelay_core::protocol::{codec, Envelope};
use sigrelay_core::{RelayError, Result};

use crate::client::ClientHandle;
use crate::config::ClientConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to a hub at `url` (for example `ws://127.0.0.1:8080/v1/ws`).
pub async fn connect(url: &str, cfg: ClientConfig) -> Result<(ClientHandle, JoinHandle<()>)> {
    let (socket, _resp) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| RelayError::Internal(format!("connect to {url} failed: {e}")))?;

    let (out_tx, out_rx) = mpsc::channel(cfg.outbound_queue);
    let client = ClientHandle::new(out_tx, cfg);
    let task = tokio::spawn(pump(client.clone(), socket, out_rx));

    tracing::info!(url, "connected");
    client.connected();
    Ok((client, task))
}

async fn pump(client: ClientHandle, socket: Socket, mut out_rx: mpsc::Receiver<Envelope>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            maybe_out = out_rx.recv() => {
                let Some(env) = maybe_out else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                match codec::encode(&env) {
                    Ok(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text)).await {
                            tracing::warn!(error = %e, "write failed");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping unencodable envelope"),
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match codec::decode(&text) {
                        Ok(env) => client.handle_inbound(env),
                        Err(e) => tracing::warn!(error = %e, "undecodable frame from hub"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    // pings are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "read failed");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("disconnected");
    client.disconnected();
}
