//! WebSocket connection handling
//!
//! Each socket gets a writer task draining its outbound queue and a read
//! loop forwarding decoded events to the coordinator. When either side
//! finishes the other is aborted and the coordinator is told the
//! connection is gone.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coordinator::CoordinatorHandle;
use crate::error::Error;
use crate::protocol::ClientEvent;
use crate::router::Outbound;
use crate::server::AppState;

/// Upgrade handler for `/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let conn_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, state, conn_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, conn_id: Uuid) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel(state.outbound_queue);

    if state.coordinator.connect(conn_id, tx).await.is_err() {
        warn!(conn_id = %conn_id, "Coordinator closed, dropping connection");
        return;
    }
    info!(conn_id = %conn_id, "Connection opened");

    let mut send_task = tokio::spawn(writer_task(sender, rx, conn_id));
    let mut recv_task = tokio::spawn(read_loop(receiver, state.coordinator.clone(), conn_id));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Coordinator may already be gone during shutdown
    let _ = state.coordinator.disconnect(conn_id).await;
    info!(conn_id = %conn_id, "Connection closed");
}

/// Writer task - sends queued frames to the client
async fn writer_task(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    conn_id: Uuid,
) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Event(frame) => {
                if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                    debug!(conn_id = %conn_id, error = %e, "Write failed");
                    break;
                }
            }
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                debug!(conn_id = %conn_id, "Closed by server");
                break;
            }
        }
    }
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    coordinator: CoordinatorHandle,
    conn_id: Uuid,
) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Read error");
                break;
            }
        };

        let decoded = match msg {
            Message::Text(text) => ClientEvent::decode(text.as_str()),
            Message::Binary(_) => Err(Error::Protocol("Binary frames are not supported".into())),
            Message::Close(_) => break,
            // Ping/pong are answered by axum
            _ => continue,
        };

        let forwarded = match decoded {
            Ok(event) => coordinator.client_event(conn_id, event).await,
            Err(e) => coordinator.malformed(conn_id, e.to_string()).await,
        };

        if forwarded.is_err() {
            break;
        }
    }
}
