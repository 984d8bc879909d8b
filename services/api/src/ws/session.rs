//! Manages the WebSocket connection lifecycle for one relayed voice session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use homefix_core::{BridgeError, BridgeEvent, SessionBridge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// What the relay loop does after a client message was handled.
#[derive(Debug, PartialEq)]
enum Step {
    Continue,
    Reply(ServerMessage),
    Stop,
}

/// Main handler for an individual WebSocket connection.
///
/// Opens a bridge, announces it with `ready`, relays until either side ends
/// the session, and always tears the bridge down before closing the socket.
#[instrument(name = "ws_relay", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));
    info!("New WebSocket connection. Opening bridge...");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (mut bridge, events) = SessionBridge::new(
        (*state.bridge_config).clone(),
        state.connector.clone(),
        state.ids.clone(),
    );

    if let Err(e) = bridge.start().await {
        error!(error = %e, "Failed to start bridge");
        let _ = send_msg(
            &mut socket_tx,
            ServerMessage::Error {
                message: e.to_string(),
            },
        )
        .await;
        let _ = socket_tx.send(Message::Close(None)).await;
        return;
    }
    info!(prompt_name = %bridge.prompt_name(), "Bridge active");

    let ready = ServerMessage::Ready {
        prompt_name: bridge.prompt_name().to_string(),
    };
    match send_msg(&mut socket_tx, ready).await {
        Ok(()) => {
            if let Err(e) = relay(&mut bridge, events, &mut socket_tx, &mut socket_rx).await {
                warn!(error = ?e, "Relay stopped: client socket unavailable");
            }
        }
        Err(e) => warn!(error = ?e, "Failed to send ready message"),
    }

    bridge.close().await;
    let _ = socket_tx.send(Message::Close(None)).await;
    info!("WebSocket connection closed and bridge torn down.");
}

/// The main event loop for an active session.
///
/// Returns an error only when the client socket can no longer be written to.
async fn relay(
    bridge: &mut SessionBridge,
    mut events: mpsc::Receiver<BridgeEvent>,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<()> {
    loop {
        tokio::select! {
            msg = socket_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => match dispatch(bridge, text.as_str()).await {
                    Ok(Step::Continue) => {}
                    Ok(Step::Reply(reply)) => send_msg(socket_tx, reply).await?,
                    Ok(Step::Stop) => {
                        info!("Client requested stop.");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Bridge operation failed");
                        send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
                        break;
                    }
                },
                Some(Ok(Message::Binary(_))) => {
                    warn!("Ignoring binary frame from client.");
                    send_msg(
                        socket_tx,
                        ServerMessage::Error { message: "Binary frames are not supported".to_string() },
                    )
                    .await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the connection.");
                    break;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    error!("Error receiving from client WebSocket: {:?}", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Some(BridgeEvent::Text(delta)) => send_msg(socket_tx, delta.into()).await?,
                Some(BridgeEvent::Audio(delta)) => send_msg(socket_tx, delta.into()).await?,
                Some(BridgeEvent::Error(message)) => {
                    error!(%message, "Bridge stream failed");
                    send_msg(socket_tx, ServerMessage::Error { message }).await?;
                    break;
                }
                None => break,
            },
        }
    }
    Ok(())
}

/// Applies one client text frame to the bridge.
async fn dispatch(bridge: &mut SessionBridge, text: &str) -> Result<Step, BridgeError> {
    let msg = match ClientMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "Rejected client message");
            return Ok(Step::Reply(ServerMessage::Error {
                message: e.to_string(),
            }));
        }
    };

    match msg {
        ClientMessage::Ping => return Ok(Step::Reply(ServerMessage::Pong)),
        ClientMessage::StartAudio => bridge.start_audio_input().await?,
        ClientMessage::AudioChunk { content } => {
            debug!(len = content.len(), "audio_chunk received");
            bridge.send_audio_base64_chunk(&content).await?
        }
        ClientMessage::EndAudio => bridge.end_audio_input().await?,
        ClientMessage::Text { content } => bridge.send_text_input(&content).await?,
        ClientMessage::Stop => return Ok(Step::Stop),
    }
    Ok(Step::Continue)
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
