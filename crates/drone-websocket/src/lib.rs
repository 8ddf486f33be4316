//! # Drone WebSocket Server
//!
//! Real-time WebSocket server streaming fleet events to the operations
//! console. Supports:
//! - Broadcast to all connected clients
//! - Per-drone subscriptions
//! - Flight commands from the client
//!
//! ## Protocol
//!
//! Messages are JSON-encoded using the types from `drone_core::events`:
//! - Server → Client: `ServerMessage`
//! - Client → Server: `ClientMessage`

pub mod error;
pub mod hub;

pub use error::{WsError, WsResult};
pub use hub::WebSocketHub;

use drone_core::{ClientMessage, ServerMessage};

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Interval between server heartbeats
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Start the WebSocket server
pub async fn start_server(hub: Arc<WebSocketHub>, port: u16) -> WsResult<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("WebSocket server listening on ws://{}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(hub, stream, addr).await {
                        error!("WebSocket connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept WebSocket connection: {}", e);
            }
        }
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    hub: Arc<WebSocketHub>,
    stream: TcpStream,
    addr: SocketAddr,
) -> WsResult<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = Uuid::new_v4();
    info!("WebSocket client {} connected from {}", client_id, addr);

    let mut broadcast_rx = hub.register_client(client_id);

    let initial_state = ServerMessage::InitialState(hub.initial_state());
    ws_sender.send(Message::Text(initial_state.to_json()?.into())).await?;

    // Replies to client requests are funnelled through the writer below
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(64);

    let hub_clone = hub.clone();
    let incoming = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    match handle_client_message(&hub_clone, client_id, &text) {
                        Ok(Some(reply)) => {
                            if reply_tx.send(reply).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Error handling client message: {}", e);
                            let reply = ServerMessage::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            };
                            if reply_tx.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Binary(_)) => {
                    warn!("Received unexpected binary message from {}", client_id);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error receiving message from {}: {}", client_id, e);
                    break;
                }
            }
        }
    });

    let mut heartbeat = tokio::time::interval(PING_INTERVAL);
    heartbeat.tick().await;

    loop {
        let outgoing = tokio::select! {
            result = broadcast_rx.recv() => match result {
                Ok(event) if hub.wants(client_id, &event) => ServerMessage::Event(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Client {} lagged by {} messages", client_id, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Broadcast channel closed");
                    break;
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(reply) => reply,
                // Reader finished: the client went away
                None => break,
            },
            _ = heartbeat.tick() => ServerMessage::Ping {
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        let json = match outgoing.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
            error!("Failed to send to client {}: {}", client_id, e);
            break;
        }
    }

    incoming.abort();
    hub.unregister_client(client_id);
    info!("WebSocket client {} disconnected", client_id);

    Ok(())
}

/// Handle a message from a client, returning the reply if one is due
fn handle_client_message(
    hub: &WebSocketHub,
    client_id: Uuid,
    text: &str,
) -> WsResult<Option<ServerMessage>> {
    let msg: ClientMessage = serde_json::from_str(text)?;

    let reply = match msg {
        ClientMessage::Subscribe { drone_ids } => {
            debug!("Client {} subscribing to {:?}", client_id, drone_ids);
            hub.subscribe(client_id, drone_ids);
            None
        }
        ClientMessage::Unsubscribe { drone_ids } => {
            debug!("Client {} unsubscribing from {:?}", client_id, drone_ids);
            hub.unsubscribe(client_id, drone_ids);
            None
        }
        ClientMessage::RequestState => {
            debug!("Client {} requesting state", client_id);
            Some(ServerMessage::InitialState(hub.initial_state()))
        }
        ClientMessage::FlightCommand(cmd) => {
            info!(
                "Client {} sending command to {}: {:?}",
                client_id, cmd.drone_id, cmd.command
            );
            Some(hub.handle_command(cmd))
        }
        ClientMessage::Pong { timestamp } => {
            debug!("Client {} pong: {}", client_id, timestamp);
            None
        }
    };

    Ok(reply)
}

// ============================================================================
// TESTS
// ============================================================================
