//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, RoomCommand},
    infrastructure::dto::websocket::ClientMessage,
    ui::state::AppState,
    usecase::{EventError, EventRouter},
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// Every event addressed to this connection goes through the channel, so room
/// handling never waits on this socket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Parse one text frame into a validated command.
fn decode(text: &str) -> Result<RoomCommand, EventError> {
    let message = serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| EventError::Malformed(e.to_string()))?;
    Ok(RoomCommand::try_from(message)?)
}

async fn handle_text(router: &EventRouter, connection_id: &ConnectionId, text: &str) {
    let result = match decode(text) {
        Ok(command) => router.dispatch(connection_id, command).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        router.report(connection_id, &e).await;
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive events
    let (tx, rx) = mpsc::unbounded_channel();
    let router = state.event_router.clone();
    let connection_id = router.connect(tx).await;

    let recv_router = router.clone();
    let recv_connection_id = connection_id.clone();

    // Spawn a task to receive events from this connection
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", recv_connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    handle_text(&recv_router, &recv_connection_id, text.as_str()).await;
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", recv_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to push events to this connection
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    router.disconnect(&connection_id).await;
}
